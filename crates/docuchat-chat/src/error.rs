//! Error types for the chat engine.

use uuid::Uuid;

use docuchat_core::error::DocuChatError;
use docuchat_gateway::GatewayError;

/// Errors from the chat engine.
///
/// All variants here are raised before the event stream opens; once
/// streaming has started, failures travel in-band as `error` events.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("at least one document id is required")]
    MissingDocumentIds,
    #[error("document not found: {0}")]
    DocumentNotFound(Uuid),
    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),
    #[error("no model specified and no default model configured")]
    NoModelAvailable,
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DocuChatError> for ChatError {
    fn from(err: DocuChatError) -> Self {
        ChatError::Storage(err.to_string())
    }
}
