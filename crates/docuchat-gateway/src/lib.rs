//! DocuChat gateway crate - HTTP client for the Ollama inference server.
//!
//! Exposes the [`ModelGateway`] trait consumed by the chat orchestrator,
//! the production [`OllamaGateway`] implementation, and a scriptable
//! [`MockGateway`] for tests.

pub mod client;
pub mod mock;

pub use client::{GatewayError, ModelGateway, ModelInfo, OllamaGateway, TokenReceiver};
pub use mock::MockGateway;
