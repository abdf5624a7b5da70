//! DocuChat API crate - axum HTTP server, route handlers, SSE chat streaming.
//!
//! Provides the REST API: document upload and management, model listing,
//! conversation and message retrieval, and the single/multi-document chat
//! endpoints that stream events over SSE.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
