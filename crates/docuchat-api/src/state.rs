//! Application state shared across all route handlers.
//!
//! AppState holds references to all services and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use docuchat_chat::ChatOrchestrator;
use docuchat_core::config::DocuChatConfig;
use docuchat_gateway::ModelGateway;
use docuchat_storage::{ConversationRepository, Database, DocumentRepository, MessageRepository};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The
/// database wrapper serializes its own access, so no extra locking here.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<DocuChatConfig>,
    /// SQLite database for persistent storage.
    pub database: Arc<Database>,
    /// Language-model gateway (Ollama in production, mock in tests).
    pub gateway: Arc<dyn ModelGateway>,
    /// Chat orchestrator driving the streaming state machine.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(
        config: DocuChatConfig,
        database: Database,
        gateway: Arc<dyn ModelGateway>,
    ) -> Self {
        let database = Arc::new(database);
        let orchestrator = Arc::new(ChatOrchestrator::new(
            Arc::clone(&database),
            Arc::clone(&gateway),
            config.chat.clone(),
            config.gateway.default_model.clone(),
        ));
        Self {
            config: Arc::new(config),
            database,
            gateway,
            orchestrator,
            start_time: Instant::now(),
        }
    }

    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(Arc::clone(&self.database))
    }

    pub fn conversations(&self) -> ConversationRepository {
        ConversationRepository::new(Arc::clone(&self.database))
    }

    pub fn messages(&self) -> MessageRepository {
        MessageRepository::new(Arc::clone(&self.database))
    }
}
