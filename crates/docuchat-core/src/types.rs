//! Shared record types for documents, conversations, and chat messages,
//! plus the wire-level stream event emitted during a chat call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An uploaded document with its extracted plain-text content.
///
/// Content is immutable once extraction has run; the summary fields are
/// filled in (or updated) independently by summary generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    /// Original file name as uploaded.
    pub name: String,
    /// MIME type reported at upload time.
    pub mime_type: String,
    /// Size of the uploaded file in bytes.
    pub size: u64,
    /// Extracted plain text. May be empty for image-only or degenerate files.
    pub content: String,
    pub summary: Option<String>,
    pub brief_summary: Option<String>,
    pub key_points: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a fresh document record for newly extracted content.
    pub fn new(name: String, mime_type: String, size: u64, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            mime_type,
            size,
            content,
            summary: None,
            brief_summary: None,
            key_points: Vec::new(),
            uploaded_at: now,
            updated_at: now,
        }
    }
}

/// A conversation groups an ordered sequence of messages about one document
/// (single-document chat) or a fixed set of documents (multi-document chat).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    /// Set for single-document conversations.
    pub document_id: Option<Uuid>,
    /// Set for multi-document conversations; empty otherwise.
    pub document_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role: {}", other)),
        }
    }
}

/// One message within a conversation.
///
/// During a chat turn the assistant message is first stored as an empty
/// placeholder; its content is written exactly once when the stream completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Model that produced an assistant message, when known.
    pub model_used: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One event on the chat wire. Transient: exists only during a single chat
/// call, never persisted.
///
/// Serialized form matches the client protocol exactly:
/// `{"type":"message_id","messageId":…}`, `{"type":"token","content":…}`,
/// `{"type":"error","content":…}`, `{"type":"done"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageId {
        #[serde(rename = "messageId")]
        message_id: Uuid,
    },
    Token {
        content: String,
    },
    Error {
        content: String,
    },
    Done,
}
