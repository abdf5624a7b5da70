//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, and all
//! endpoint handlers.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Body limit for the upload route: the 10MB file plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = 12 * 1024 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Any origin may call the API; it is meant to sit behind a local
    // frontend during development.
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/models", get(handlers::list_models))
        .route("/api/documents", get(handlers::list_documents))
        .route(
            "/api/documents/upload",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/documents/{id}",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .route(
            "/api/conversations/{document_id}",
            get(handlers::get_conversation),
        )
        .route(
            "/api/messages/{conversation_id}",
            get(handlers::get_messages),
        )
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/multi", post(handlers::chat_multi))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
pub async fn start_server(
    state: AppState,
    port: u16,
) -> Result<(), docuchat_core::error::DocuChatError> {
    let addr = format!("0.0.0.0:{}", port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| docuchat_core::error::DocuChatError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| docuchat_core::error::DocuChatError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
