//! Chat orchestrator: the state machine behind one chat call.
//!
//! A call moves through validation (content thresholds, greeting
//! short-circuit), streaming (prompt build + gateway relay), verification
//! (grounding check, optional warning), and persistence, emitting events in
//! the fixed order `message_id`, `token`*, optional `error`, `done`. Every
//! failure before the stream opens is a typed [`ChatError`]; everything
//! after travels in-band, and `done` is never skipped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use docuchat_core::config::ChatConfig;
use docuchat_core::types::{Conversation, Document, Message, MessageRole, StreamEvent};
use docuchat_gateway::ModelGateway;
use docuchat_storage::{ConversationRepository, Database, DocumentRepository, MessageRepository};

use crate::error::ChatError;
use crate::prompt;
use crate::verifier::{GroundingVerifier, UNGROUNDED_WARNING};

/// Capacity of the per-call event channel. Consumers (the SSE writer) drain
/// fast; backpressure here just pauses the gateway relay.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Receiving end of one chat call's event stream.
pub type EventReceiver = mpsc::Receiver<StreamEvent>;

/// Coordinates document loading, message lifecycle, gateway streaming, and
/// grounding verification for chat calls.
///
/// Holds no per-call state: each call owns its placeholder message and its
/// event channel exclusively, so concurrent calls on different
/// conversations never interact.
pub struct ChatOrchestrator {
    db: Arc<Database>,
    gateway: Arc<dyn ModelGateway>,
    config: ChatConfig,
    default_model: String,
}

impl ChatOrchestrator {
    /// Create a new orchestrator over the given store and gateway.
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn ModelGateway>,
        config: ChatConfig,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            db,
            gateway,
            config,
            default_model: default_model.into(),
        }
    }

    /// Start a single-document chat call.
    ///
    /// Returns the event receiver once the user message and assistant
    /// placeholder are persisted; all later outcomes arrive as events.
    pub async fn chat(
        &self,
        document_id: Uuid,
        conversation_id: Option<Uuid>,
        question: &str,
        model: Option<&str>,
    ) -> Result<EventReceiver, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let documents = DocumentRepository::new(Arc::clone(&self.db));
        let document = documents
            .find_by_id(document_id)?
            .ok_or(ChatError::DocumentNotFound(document_id))?;

        let conversation = self.resolve_conversation(conversation_id, |repo| {
            repo.create_for_document(document_id)
        })?;

        self.spawn_turn(vec![document], false, conversation, question, model)
    }

    /// Start a multi-document chat call.
    ///
    /// Any missing document id fails the whole call before streaming begins.
    pub async fn chat_multi(
        &self,
        document_ids: &[Uuid],
        conversation_id: Option<Uuid>,
        question: &str,
        model: Option<&str>,
    ) -> Result<EventReceiver, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        if document_ids.is_empty() {
            return Err(ChatError::MissingDocumentIds);
        }

        let repo = DocumentRepository::new(Arc::clone(&self.db));
        let mut documents = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            let doc = repo
                .find_by_id(*id)?
                .ok_or(ChatError::DocumentNotFound(*id))?;
            documents.push(doc);
        }

        let conversation = self.resolve_conversation(conversation_id, |repo| {
            repo.create_for_documents(document_ids)
        })?;

        self.spawn_turn(documents, true, conversation, question, model)
    }

    // -- Private helpers --

    /// Reuse the supplied conversation or create one scoped to the call's
    /// documents.
    fn resolve_conversation<F>(
        &self,
        conversation_id: Option<Uuid>,
        create: F,
    ) -> Result<Conversation, ChatError>
    where
        F: FnOnce(&ConversationRepository) -> Result<Conversation, docuchat_core::error::DocuChatError>,
    {
        let repo = ConversationRepository::new(Arc::clone(&self.db));
        match conversation_id {
            Some(id) => repo
                .find_by_id(id)?
                .ok_or(ChatError::ConversationNotFound(id)),
            None => Ok(create(&repo)?),
        }
    }

    /// Resolve the model for this call: request value, else configured default.
    fn resolve_model(&self, requested: Option<&str>) -> Result<String, ChatError> {
        if let Some(m) = requested {
            if !m.trim().is_empty() {
                return Ok(m.to_string());
            }
        }
        if self.default_model.trim().is_empty() {
            return Err(ChatError::NoModelAvailable);
        }
        Ok(self.default_model.clone())
    }

    /// Persist the turn's messages, then hand the rest of the state machine
    /// to a background task that owns the event channel's sending side.
    fn spawn_turn(
        &self,
        documents: Vec<Document>,
        multi: bool,
        conversation: Conversation,
        question: &str,
        model: Option<&str>,
    ) -> Result<EventReceiver, ChatError> {
        let model = self.resolve_model(model)?;
        let messages = MessageRepository::new(Arc::clone(&self.db));

        // Context window is captured before this turn's messages land.
        let history = messages.recent(conversation.id, self.config.history_window)?;

        // The user message is always persisted, even if the call later
        // refuses or fails.
        messages.append(conversation.id, MessageRole::User, question, None)?;
        let placeholder = messages.append(conversation.id, MessageRole::Assistant, "", Some(&model))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let turn = ChatTurn {
            gateway: Arc::clone(&self.gateway),
            messages,
            config: self.config.clone(),
            model,
            question: question.to_string(),
            documents,
            multi,
            history,
            placeholder_id: placeholder.id,
            tx,
        };
        tokio::spawn(turn.run());

        Ok(rx)
    }
}

/// Everything one in-flight chat call owns.
struct ChatTurn {
    gateway: Arc<dyn ModelGateway>,
    messages: MessageRepository,
    config: ChatConfig,
    model: String,
    question: String,
    documents: Vec<Document>,
    multi: bool,
    history: Vec<Message>,
    placeholder_id: Uuid,
    tx: mpsc::Sender<StreamEvent>,
}

impl ChatTurn {
    async fn run(mut self) {
        // The placeholder id goes out first so the caller can correlate
        // later edits to this message.
        if self
            .tx
            .send(StreamEvent::MessageId {
                message_id: self.placeholder_id,
            })
            .await
            .is_err()
        {
            return;
        }

        // VALIDATING: apply the content threshold per document.
        let min = self.config.min_content_chars;
        let (usable, excluded): (Vec<Document>, Vec<Document>) =
            std::mem::take(&mut self.documents)
                .into_iter()
                .partition(|d| d.content.trim().chars().count() >= min);

        if usable.is_empty() {
            let reply = if self.multi {
                prompt::INSUFFICIENT_CONTENT_REPLY_MULTI
            } else {
                prompt::INSUFFICIENT_CONTENT_REPLY
            };
            self.finish_with_text(reply).await;
            return;
        }

        if prompt::is_greeting(&self.question) {
            self.finish_with_text(prompt::GREETING_REPLY).await;
            return;
        }

        let mut accumulated = String::new();

        if !excluded.is_empty() {
            let names: Vec<String> = excluded.iter().map(|d| d.name.clone()).collect();
            info!(excluded = ?names, "Excluding documents below the content threshold");
            let notice = prompt::exclusion_notice(&names);
            accumulated.push_str(&notice);
            if self
                .tx
                .send(StreamEvent::Token { content: notice })
                .await
                .is_err()
            {
                return;
            }
        }

        // STREAMING: build the prompt and relay gateway tokens.
        let prompt_text = if self.multi {
            prompt::multi_document_prompt(&usable, &self.history, &self.question)
        } else {
            prompt::single_document_prompt(&usable[0], &self.history, &self.question)
        };

        let mut tokens = match self.gateway.generate_stream(&self.model, &prompt_text).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, model = %self.model, "Gateway call failed");
                self.fail(e.to_string()).await;
                return;
            }
        };

        while let Some(item) = tokens.recv().await {
            match item {
                Ok(token) => {
                    accumulated.push_str(&token);
                    if self
                        .tx
                        .send(StreamEvent::Token { content: token })
                        .await
                        .is_err()
                    {
                        // Client disconnected. Dropping the token receiver
                        // cancels the gateway relay; partial text is discarded.
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Gateway stream failed mid-response");
                    self.fail(e.to_string()).await;
                    return;
                }
            }
        }

        // VERIFYING: best-effort grounding check over the full text.
        let verifier = GroundingVerifier::new(&self.config);
        let names: Vec<String> = if self.multi {
            usable.iter().map(|d| d.name.clone()).collect()
        } else {
            Vec::new()
        };
        let verdict = verifier.assess(&accumulated, &names);
        if verifier.needs_warning(&accumulated, &verdict) {
            let flagged: Vec<Uuid> = usable.iter().map(|d| d.id).collect();
            info!(documents = ?flagged, "Response not visibly document-grounded, appending warning");
            accumulated.push_str(UNGROUNDED_WARNING);
            if self
                .tx
                .send(StreamEvent::Token {
                    content: UNGROUNDED_WARNING.to_string(),
                })
                .await
                .is_err()
            {
                return;
            }
        }

        // PERSISTED: single content update of the placeholder, then DONE.
        self.persist(&accumulated).await;
        let _ = self.tx.send(StreamEvent::Done).await;
    }

    /// Early-exit path (refusal, greeting): one token, one update, done.
    async fn finish_with_text(&self, text: &str) {
        let _ = self
            .tx
            .send(StreamEvent::Token {
                content: text.to_string(),
            })
            .await;
        self.persist(text).await;
        let _ = self.tx.send(StreamEvent::Done).await;
    }

    /// Error path: surface the failure in-band, then still close cleanly.
    async fn fail(&self, message: String) {
        let _ = self.tx.send(StreamEvent::Error { content: message }).await;
        let _ = self.tx.send(StreamEvent::Done).await;
    }

    /// Write the final text into the placeholder message. Storage failures
    /// here become in-band error events; the stream still ends with `done`.
    async fn persist(&self, text: &str) {
        match self.messages.update_content(self.placeholder_id, text) {
            Ok(true) => {}
            Ok(false) => {
                warn!(message_id = %self.placeholder_id, "Placeholder message vanished before update");
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist assistant message");
                let _ = self
                    .tx
                    .send(StreamEvent::Error {
                        content: format!("failed to persist response: {}", e),
                    })
                    .await;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
