//! DocuChat storage crate - SQLite persistence for documents,
//! conversations, and messages.
//!
//! Provides a WAL-mode SQLite database with migrations and repository
//! implementations. The chat core reads documents and appends/updates
//! messages exclusively through these repositories.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{ConversationRepository, DocumentRepository, MessageRepository};
