//! Database schema migrations.
//!
//! Applies the initial schema: documents, conversations, messages, and the
//! schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use docuchat_core::error::DocuChatError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), DocuChatError> {
    // Create the migrations tracking table first.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| DocuChatError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| DocuChatError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), DocuChatError> {
    conn.execute_batch(
        "
        -- Uploaded documents with extracted text and optional summary fields.
        CREATE TABLE IF NOT EXISTS documents (
            id              TEXT PRIMARY KEY NOT NULL,
            name            TEXT NOT NULL,
            mime_type       TEXT NOT NULL DEFAULT '',
            size            INTEGER NOT NULL DEFAULT 0,
            content         TEXT NOT NULL DEFAULT '',
            summary         TEXT,
            brief_summary   TEXT,
            key_points      TEXT NOT NULL DEFAULT '[]',
            uploaded_at     INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_uploaded_at
            ON documents (uploaded_at DESC);

        -- Conversations: single-document (document_id) or
        -- multi-document (document_ids JSON array).
        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY NOT NULL,
            document_id     TEXT
                            REFERENCES documents(id) ON DELETE CASCADE,
            document_ids    TEXT NOT NULL DEFAULT '[]',
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_document
            ON conversations (document_id)
            WHERE document_id IS NOT NULL;

        -- Messages within a conversation.
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY NOT NULL,
            conversation_id TEXT NOT NULL
                            REFERENCES conversations(id) ON DELETE CASCADE,
            role            TEXT NOT NULL
                            CHECK (role IN ('user', 'assistant')),
            content         TEXT NOT NULL DEFAULT '',
            model_used      TEXT,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages (conversation_id, created_at ASC);

        -- Record migration.
        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| DocuChatError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
