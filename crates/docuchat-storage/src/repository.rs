//! Repository implementations for SQLite-backed persistence.
//!
//! Provides DocumentRepository, ConversationRepository, and MessageRepository
//! that operate on the Database struct using raw SQL.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use docuchat_core::error::DocuChatError;
use docuchat_core::types::{Conversation, Document, Message, MessageRole};

use crate::db::Database;

fn parse_uuid(s: &str) -> Result<Uuid, DocuChatError> {
    Uuid::parse_str(s).map_err(|e| DocuChatError::Storage(format!("Invalid UUID in row: {}", e)))
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn row_to_document(row: &Row<'_>) -> Result<Document, DocuChatError> {
    let id: String = row
        .get(0)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;
    let key_points_json: String = row
        .get(7)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;
    let key_points: Vec<String> = serde_json::from_str(&key_points_json).unwrap_or_default();

    Ok(Document {
        id: parse_uuid(&id)?,
        name: row
            .get(1)
            .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        mime_type: row
            .get(2)
            .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        size: row
            .get::<_, i64>(3)
            .map_err(|e| DocuChatError::Storage(e.to_string()))? as u64,
        content: row
            .get(4)
            .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        summary: row
            .get(5)
            .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        brief_summary: row
            .get(6)
            .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        key_points,
        uploaded_at: epoch_to_utc(
            row.get(8)
                .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        ),
        updated_at: epoch_to_utc(
            row.get(9)
                .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        ),
    })
}

fn row_to_conversation(row: &Row<'_>) -> Result<Conversation, DocuChatError> {
    let id: String = row
        .get(0)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;
    let document_id: Option<String> = row
        .get(1)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;
    let document_ids_json: String = row
        .get(2)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;
    let ids: Vec<String> = serde_json::from_str(&document_ids_json).unwrap_or_default();
    let mut document_ids = Vec::with_capacity(ids.len());
    for s in &ids {
        document_ids.push(parse_uuid(s)?);
    }

    Ok(Conversation {
        id: parse_uuid(&id)?,
        document_id: document_id.as_deref().map(parse_uuid).transpose()?,
        document_ids,
        created_at: epoch_to_utc(
            row.get(3)
                .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        ),
    })
}

fn row_to_message(row: &Row<'_>) -> Result<Message, DocuChatError> {
    let id: String = row
        .get(0)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;
    let conversation_id: String = row
        .get(1)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;
    let role: String = row
        .get(2)
        .map_err(|e| DocuChatError::Storage(e.to_string()))?;

    Ok(Message {
        id: parse_uuid(&id)?,
        conversation_id: parse_uuid(&conversation_id)?,
        role: role
            .parse::<MessageRole>()
            .map_err(DocuChatError::Storage)?,
        content: row
            .get(3)
            .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        model_used: row
            .get(4)
            .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        created_at: epoch_to_utc(
            row.get(5)
                .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        ),
        updated_at: epoch_to_utc(
            row.get(6)
                .map_err(|e| DocuChatError::Storage(e.to_string()))?,
        ),
    })
}

/// Repository for uploaded documents.
pub struct DocumentRepository {
    db: Arc<Database>,
}

impl DocumentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new document.
    pub fn save(&self, doc: &Document) -> Result<(), DocuChatError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, name, mime_type, size, content, summary, brief_summary, key_points, uploaded_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    doc.id.to_string(),
                    doc.name,
                    doc.mime_type,
                    doc.size as i64,
                    doc.content,
                    doc.summary,
                    doc.brief_summary,
                    serde_json::to_string(&doc.key_points).unwrap_or_else(|_| "[]".to_string()),
                    doc.uploaded_at.timestamp(),
                    doc.updated_at.timestamp(),
                ],
            )
            .map_err(|e| DocuChatError::Storage(format!("Failed to save document: {}", e)))?;
            Ok(())
        })
    }

    /// Find a document by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Document>, DocuChatError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, mime_type, size, content, summary, brief_summary, key_points, uploaded_at, updated_at
                     FROM documents WHERE id = ?1",
                )
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string()], |row| {
                    Ok(row_to_document(row))
                })
                .optional()
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            match result {
                Some(doc) => Ok(Some(doc?)),
                None => Ok(None),
            }
        })
    }

    /// Find documents by ID, preserving the requested order.
    ///
    /// IDs with no matching document are skipped; the caller decides whether
    /// a shorter result is an error.
    pub fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>, DocuChatError> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.find_by_id(*id)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// List all documents, most recently uploaded first.
    pub fn list(&self) -> Result<Vec<Document>, DocuChatError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, mime_type, size, content, summary, brief_summary, key_points, uploaded_at, updated_at
                     FROM documents
                     ORDER BY uploaded_at DESC, rowid DESC",
                )
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(row_to_document(row)))
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let mut docs = Vec::new();
            for row in rows {
                let doc = row.map_err(|e| DocuChatError::Storage(e.to_string()))??;
                docs.push(doc);
            }
            Ok(docs)
        })
    }

    /// Update the summary fields of a document. Content is never touched.
    pub fn update_summary(
        &self,
        id: Uuid,
        summary: Option<&str>,
        brief_summary: Option<&str>,
        key_points: &[String],
    ) -> Result<(), DocuChatError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE documents
                 SET summary = ?2, brief_summary = ?3, key_points = ?4, updated_at = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    summary,
                    brief_summary,
                    serde_json::to_string(key_points).unwrap_or_else(|_| "[]".to_string()),
                    Utc::now().timestamp(),
                ],
            )
            .map_err(|e| DocuChatError::Storage(format!("Failed to update summary: {}", e)))?;
            Ok(())
        })
    }

    /// Delete a document and every conversation that references it.
    ///
    /// Single-document conversations cascade via the foreign key;
    /// multi-document conversations are matched against their ID list.
    /// Returns false if the document did not exist.
    pub fn delete(&self, id: Uuid) -> Result<bool, DocuChatError> {
        self.db.with_conn(|conn| {
            let id_str = id.to_string();
            conn.execute(
                "DELETE FROM conversations WHERE document_ids LIKE '%' || ?1 || '%'",
                rusqlite::params![id_str],
            )
            .map_err(|e| DocuChatError::Storage(format!("Failed to delete conversations: {}", e)))?;

            let affected = conn
                .execute(
                    "DELETE FROM documents WHERE id = ?1",
                    rusqlite::params![id_str],
                )
                .map_err(|e| DocuChatError::Storage(format!("Failed to delete document: {}", e)))?;
            Ok(affected > 0)
        })
    }
}

/// Repository for conversations.
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a conversation scoped to a single document.
    pub fn create_for_document(&self, document_id: Uuid) -> Result<Conversation, DocuChatError> {
        let conv = Conversation {
            id: Uuid::new_v4(),
            document_id: Some(document_id),
            document_ids: Vec::new(),
            created_at: Utc::now(),
        };
        self.insert(&conv)?;
        Ok(conv)
    }

    /// Create a conversation scoped to a set of documents.
    pub fn create_for_documents(
        &self,
        document_ids: &[Uuid],
    ) -> Result<Conversation, DocuChatError> {
        let conv = Conversation {
            id: Uuid::new_v4(),
            document_id: None,
            document_ids: document_ids.to_vec(),
            created_at: Utc::now(),
        };
        self.insert(&conv)?;
        Ok(conv)
    }

    fn insert(&self, conv: &Conversation) -> Result<(), DocuChatError> {
        let ids: Vec<String> = conv.document_ids.iter().map(|d| d.to_string()).collect();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, document_id, document_ids, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    conv.id.to_string(),
                    conv.document_id.map(|d| d.to_string()),
                    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string()),
                    conv.created_at.timestamp(),
                ],
            )
            .map_err(|e| DocuChatError::Storage(format!("Failed to create conversation: {}", e)))?;
            Ok(())
        })
    }

    /// Find a conversation by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, DocuChatError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, document_id, document_ids, created_at
                     FROM conversations WHERE id = ?1",
                )
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string()], |row| {
                    Ok(row_to_conversation(row))
                })
                .optional()
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            match result {
                Some(conv) => Ok(Some(conv?)),
                None => Ok(None),
            }
        })
    }

    /// Find the conversation for a single document, if one exists.
    pub fn find_by_document(
        &self,
        document_id: Uuid,
    ) -> Result<Option<Conversation>, DocuChatError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, document_id, document_ids, created_at
                     FROM conversations WHERE document_id = ?1
                     ORDER BY created_at ASC LIMIT 1",
                )
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![document_id.to_string()], |row| {
                    Ok(row_to_conversation(row))
                })
                .optional()
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            match result {
                Some(conv) => Ok(Some(conv?)),
                None => Ok(None),
            }
        })
    }
}

/// Repository for messages.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message to a conversation.
    pub fn append(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        model_used: Option<&str>,
    ) -> Result<Message, DocuChatError> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            model_used: model_used.map(|s| s.to_string()),
            created_at: now,
            updated_at: now,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, model_used, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id.to_string(),
                    message.role.as_str(),
                    message.content,
                    message.model_used,
                    message.created_at.timestamp(),
                    message.updated_at.timestamp(),
                ],
            )
            .map_err(|e| DocuChatError::Storage(format!("Failed to append message: {}", e)))?;
            Ok(())
        })?;

        Ok(message)
    }

    /// List all messages of a conversation in chronological order.
    ///
    /// Insertion order breaks ties between messages stored within the same
    /// second (user message before its assistant placeholder).
    pub fn list(&self, conversation_id: Uuid) -> Result<Vec<Message>, DocuChatError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, role, content, model_used, created_at, updated_at
                     FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| DocuChatError::Storage(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })
    }

    /// Return the most recent `limit` messages in chronological order.
    ///
    /// This is the context window fed into the chat prompt.
    pub fn recent(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, DocuChatError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, role, content, model_used, created_at, updated_at
                     FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2",
                )
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![conversation_id.to_string(), limit as i64],
                    |row| Ok(row_to_message(row)),
                )
                .map_err(|e| DocuChatError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| DocuChatError::Storage(e.to_string()))??;
                messages.push(message);
            }
            messages.reverse();
            Ok(messages)
        })
    }

    /// Overwrite the content of a message in place.
    ///
    /// Used exactly once per chat call to fill the assistant placeholder with
    /// the final streamed text. Returns false if the message does not exist.
    pub fn update_content(&self, message_id: Uuid, content: &str) -> Result<bool, DocuChatError> {
        self.db.with_conn(|conn| {
            let affected = conn
                .execute(
                    "UPDATE messages SET content = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![message_id.to_string(), content, Utc::now().timestamp()],
                )
                .map_err(|e| {
                    DocuChatError::Storage(format!("Failed to update message: {}", e))
                })?;
            Ok(affected > 0)
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
