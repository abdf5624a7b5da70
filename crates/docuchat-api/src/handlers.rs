//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/body parameters via axum extractors,
//! interacts with AppState services, and returns JSON responses. The chat
//! handlers instead return SSE streams fed by the orchestrator's event
//! channel.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use docuchat_chat::orchestrator::EventReceiver;
use docuchat_chat::summary::generate_document_summary;
use docuchat_core::types::{Conversation, Document, Message};
use docuchat_gateway::ModelInfo;

use crate::error::ApiError;
use crate::state::AppState;

/// Upload cap. Larger files should be split before upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// Request/response types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub document_id: Option<String>,
    pub conversation_id: Option<String>,
    pub question: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiChatRequest {
    #[serde(default)]
    pub document_ids: Vec<String>,
    pub conversation_id: Option<String>,
    pub question: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: Uuid,
    pub document_id: Option<Uuid>,
    pub document_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conv: Conversation) -> Self {
        Self {
            id: conv.id,
            document_id: conv.document_id,
            document_ids: conv.document_ids,
            created_at: conv.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} id: {}", what, raw)))
}

// =============================================================================
// Health and models
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /api/models - available models from the gateway.
///
/// An unreachable gateway yields an empty list, not an error, so the UI
/// stays usable while Ollama is down.
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    match state.gateway.list_models().await {
        Ok(models) => Json(models),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to fetch models from gateway");
            Json(Vec::new())
        }
    }
}

// =============================================================================
// Documents
// =============================================================================

/// POST /api/documents/upload - multipart upload with text extraction.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Document>, ApiError> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, mime_type, bytes.to_vec()));
        break;
    }

    let Some((filename, mime_type, bytes)) = upload else {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    };
    if filename.is_empty() {
        return Err(ApiError::BadRequest("No file provided".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest(
            "File size exceeds 10MB limit".to_string(),
        ));
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();
    let content = docuchat_extract::extract_text(&bytes, &mime_type, extension)?;

    let document = Document::new(filename, mime_type, bytes.len() as u64, content);
    let documents = state.documents();
    documents.save(&document)?;
    tracing::info!(document_id = %document.id, name = %document.name, "Document uploaded");

    // Best-effort summary; the upload succeeds whether or not this does.
    generate_document_summary(
        state.gateway.as_ref(),
        &documents,
        &state.config.chat,
        &state.config.gateway.default_model,
        &document,
    )
    .await;

    let stored = documents
        .find_by_id(document.id)?
        .ok_or_else(|| ApiError::Internal("Document vanished after upload".to_string()))?;
    Ok(Json(stored))
}

/// GET /api/documents - all documents, newest first.
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.documents().list()?))
}

/// GET /api/documents/{id} - single document.
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let id = parse_id(&id, "document")?;
    let document = state
        .documents()
        .find_by_id(id)?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    Ok(Json(document))
}

/// DELETE /api/documents/{id} - delete a document and its conversations.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = parse_id(&id, "document")?;
    if !state.documents().delete(id)? {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }
    Ok(Json(DeleteResponse { success: true }))
}

// =============================================================================
// Conversations and messages
// =============================================================================

/// GET /api/conversations/{document_id} - get or create the document's
/// conversation.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let document_id = parse_id(&document_id, "document")?;
    if state.documents().find_by_id(document_id)?.is_none() {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }

    let conversations = state.conversations();
    let conversation = match conversations.find_by_document(document_id)? {
        Some(conv) => conv,
        None => conversations.create_for_document(document_id)?,
    };
    Ok(Json(conversation.into()))
}

/// GET /api/messages/{conversation_id} - ordered messages of a conversation.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let conversation_id = parse_id(&conversation_id, "conversation")?;
    if state
        .conversations()
        .find_by_id(conversation_id)?
        .is_none()
    {
        return Err(ApiError::NotFound("Conversation not found".to_string()));
    }
    Ok(Json(state.messages().list(conversation_id)?))
}

// =============================================================================
// Chat (SSE)
// =============================================================================

/// Adapt the orchestrator's event channel into an SSE response. Each event
/// becomes one `data: <json>` frame; the stream ends when the channel closes.
fn sse_response(
    rx: EventReceiver,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// POST /api/chat - single-document chat, streamed over SSE.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let question = body.question.unwrap_or_default();
    let document_id = body
        .document_id
        .ok_or_else(|| ApiError::BadRequest("documentId is required".to_string()))?;
    let document_id = parse_id(&document_id, "document")?;
    let conversation_id = body
        .conversation_id
        .as_deref()
        .map(|raw| parse_id(raw, "conversation"))
        .transpose()?;

    let rx = state
        .orchestrator
        .chat(document_id, conversation_id, &question, body.model.as_deref())
        .await?;
    Ok(sse_response(rx))
}

/// POST /api/chat/multi - multi-document chat, streamed over SSE.
pub async fn chat_multi(
    State(state): State<AppState>,
    Json(body): Json<MultiChatRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let question = body.question.unwrap_or_default();
    let mut document_ids = Vec::with_capacity(body.document_ids.len());
    for raw in &body.document_ids {
        document_ids.push(parse_id(raw, "document")?);
    }
    let conversation_id = body
        .conversation_id
        .as_deref()
        .map(|raw| parse_id(raw, "conversation"))
        .transpose()?;

    let rx = state
        .orchestrator
        .chat_multi(
            &document_ids,
            conversation_id,
            &question,
            body.model.as_deref(),
        )
        .await?;
    Ok(sse_response(rx))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use docuchat_core::config::DocuChatConfig;
    use docuchat_core::types::StreamEvent;
    use docuchat_gateway::MockGateway;
    use docuchat_storage::Database;

    const LONG_CONTENT: &str =
        "The quarterly report shows revenue grew by ten percent while costs stayed flat.";

    fn make_state(gateway: MockGateway) -> AppState {
        let db = Database::in_memory().unwrap();
        AppState::new(DocuChatConfig::default(), db, Arc::new(gateway))
    }

    fn make_app(gateway: MockGateway) -> (axum::Router, AppState) {
        let state = make_state(gateway);
        (crate::create_router(state.clone()), state)
    }

    fn seed_document(state: &AppState, name: &str, content: &str) -> Document {
        let doc = Document::new(
            name.to_string(),
            "text/plain".to_string(),
            content.len() as u64,
            content.to_string(),
        );
        state.documents().save(&doc).unwrap();
        doc
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_events(resp: axum::response::Response) -> Vec<StreamEvent> {
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&bytes);
        text.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    fn multipart_upload(filename: &str, content_type: &str, content: &[u8]) -> Request<Body> {
        let boundary = "docuchat-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::post("/api/documents/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn chat_request(body: serde_json::Value) -> Request<Body> {
        Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multi_chat_request(body: serde_json::Value) -> Request<Body> {
        Request::post("/api/chat/multi")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // ---- Health and models ----

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_models_endpoint() {
        let (app, _) = make_app(MockGateway::new().with_models(&["llama2", "mistral"]));
        let resp = app
            .oneshot(Request::get("/api/models").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["name"], "llama2");
    }

    // ---- Documents ----

    #[tokio::test]
    async fn test_upload_text_document() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(multipart_upload(
                "test.txt",
                "text/plain",
                b"This is a test document",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["name"], "test.txt");
        assert_eq!(json["content"], "This is a test document");
        assert!(json["id"].is_string());
    }

    #[tokio::test]
    async fn test_upload_stores_summary_when_gateway_cooperates() {
        let gateway = MockGateway::new().with_response(
            r#"{"summary":"A test file.","briefSummary":"Test.","keyPoints":["short"]}"#,
        );
        let (app, _) = make_app(gateway);
        let resp = app
            .oneshot(multipart_upload(
                "test.txt",
                "text/plain",
                b"This is a test document",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["summary"], "A test file.");
        assert_eq!(json["brief_summary"], "Test.");
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (app, _) = make_app(MockGateway::new());
        let boundary = "docuchat-test-boundary";
        let body = format!("--{boundary}--\r\n");
        let resp = app
            .oneshot(
                Request::post("/api/documents/upload")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_unsupported_type() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(multipart_upload(
                "image.bin",
                "application/octet-stream",
                b"\x00\x01\x02",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let (app, _) = make_app(MockGateway::new());
        let big = vec![b'a'; 11 * 1024 * 1024];
        let resp = app
            .oneshot(multipart_upload("large.txt", "text/plain", &big))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("exceeds 10MB limit"));
    }

    #[tokio::test]
    async fn test_get_document_by_id() {
        let (app, state) = make_app(MockGateway::new());
        let doc = seed_document(&state, "report.txt", LONG_CONTENT);

        let resp = app
            .oneshot(
                Request::get(format!("/api/documents/{}", doc.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["name"], "report.txt");
    }

    #[tokio::test]
    async fn test_get_document_not_found() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(
                Request::get(format!("/api/documents/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_documents() {
        let (app, state) = make_app(MockGateway::new());
        seed_document(&state, "a.txt", "aaa");
        seed_document(&state, "b.txt", "bbb");

        let resp = app
            .oneshot(Request::get("/api/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_document() {
        let (app, state) = make_app(MockGateway::new());
        let doc = seed_document(&state, "gone.txt", "x");

        let resp = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/documents/{}", doc.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);

        let resp = app
            .oneshot(
                Request::get(format!("/api/documents/{}", doc.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_document_not_found() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(
                Request::delete(format!("/api/documents/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // ---- Conversations and messages ----

    #[tokio::test]
    async fn test_get_conversation_creates_then_reuses() {
        let (app, state) = make_app(MockGateway::new());
        let doc = seed_document(&state, "a.txt", LONG_CONTENT);

        let resp = app
            .clone()
            .oneshot(
                Request::get(format!("/api/conversations/{}", doc.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let first = body_json(resp).await;
        assert_eq!(first["documentId"], doc.id.to_string());

        let resp = app
            .oneshot(
                Request::get(format!("/api/conversations/{}", doc.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let second = body_json(resp).await;
        assert_eq!(first["id"], second["id"]);
    }

    #[tokio::test]
    async fn test_get_conversation_unknown_document() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(
                Request::get(format!("/api/conversations/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_messages_empty() {
        let (app, state) = make_app(MockGateway::new());
        let doc = seed_document(&state, "a.txt", LONG_CONTENT);
        let conv = state.conversations().create_for_document(doc.id).unwrap();

        let resp = app
            .oneshot(
                Request::get(format!("/api/messages/{}", conv.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_get_messages_unknown_conversation() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(
                Request::get(format!("/api/messages/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // ---- Chat: pre-stream failures ----

    #[tokio::test]
    async fn test_chat_missing_question() {
        let (app, state) = make_app(MockGateway::new());
        let doc = seed_document(&state, "a.txt", LONG_CONTENT);

        let resp = app
            .oneshot(chat_request(serde_json::json!({"documentId": doc.id})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_missing_document_id() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(chat_request(serde_json::json!({"question": "hello?"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_invalid_document_id() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(chat_request(
                serde_json::json!({"documentId": "not-a-uuid", "question": "q?"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_unknown_document() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(chat_request(
                serde_json::json!({"documentId": Uuid::new_v4(), "question": "q?"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_multi_chat_empty_document_ids() {
        let (app, _) = make_app(MockGateway::new());
        let resp = app
            .oneshot(multi_chat_request(
                serde_json::json!({"documentIds": [], "question": "q?"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    // ---- Chat: SSE streams ----

    #[tokio::test]
    async fn test_chat_streams_events_in_order() {
        let gateway = MockGateway::new().with_tokens([
            "The report states that ",
            "revenue grew ten percent overall.",
        ]);
        let (app, state) = make_app(gateway.clone());
        let doc = seed_document(&state, "report.txt", LONG_CONTENT);

        let resp = app
            .oneshot(chat_request(
                serde_json::json!({"documentId": doc.id, "question": "how did revenue do?"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let events = body_events(resp).await;
        assert!(matches!(events[0], StreamEvent::MessageId { .. }));
        assert!(matches!(events[1], StreamEvent::Token { .. }));
        assert!(matches!(events[2], StreamEvent::Token { .. }));
        assert_eq!(*events.last().unwrap(), StreamEvent::Done);
        assert_eq!(gateway.generation_calls(), 1);
    }

    #[tokio::test]
    async fn test_chat_persists_turn() {
        let gateway = MockGateway::new().with_tokens(["the full answer."]);
        let (app, state) = make_app(gateway);
        let doc = seed_document(&state, "report.txt", LONG_CONTENT);

        let resp = app
            .clone()
            .oneshot(chat_request(
                serde_json::json!({"documentId": doc.id, "question": "what is it?"}),
            ))
            .await
            .unwrap();
        body_events(resp).await;

        let conv = state
            .conversations()
            .find_by_document(doc.id)
            .unwrap()
            .unwrap();
        let resp = app
            .oneshot(
                Request::get(format!("/api/messages/{}", conv.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        let messages = json.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "what is it?");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "the full answer.");
    }

    #[tokio::test]
    async fn test_chat_refuses_short_document_without_gateway_call() {
        let gateway = MockGateway::new().with_tokens(["should not run"]);
        let (app, state) = make_app(gateway.clone());
        let doc = seed_document(&state, "tiny.txt", "x");

        let resp = app
            .oneshot(chat_request(
                serde_json::json!({"documentId": doc.id, "question": "what is it?"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let events = body_events(resp).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], StreamEvent::MessageId { .. }));
        assert!(matches!(events[1], StreamEvent::Token { .. }));
        assert_eq!(events[2], StreamEvent::Done);
        assert_eq!(gateway.generation_calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_gateway_failure_is_in_band() {
        let gateway = MockGateway::new().failing_with_status(503);
        let (app, state) = make_app(gateway);
        let doc = seed_document(&state, "report.txt", LONG_CONTENT);

        let resp = app
            .oneshot(chat_request(
                serde_json::json!({"documentId": doc.id, "question": "what is it?"}),
            ))
            .await
            .unwrap();
        // The stream opened, so the HTTP status stays 200.
        assert_eq!(resp.status(), StatusCode::OK);

        let events = body_events(resp).await;
        assert!(matches!(events[0], StreamEvent::MessageId { .. }));
        assert!(matches!(events[1], StreamEvent::Error { .. }));
        assert_eq!(events[2], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_multi_chat_exclusion_notice() {
        let gateway = MockGateway::new().with_tokens(["combined answer."]);
        let (app, state) = make_app(gateway);
        let good = seed_document(&state, "report.txt", LONG_CONTENT);
        let empty = seed_document(&state, "scan.pdf", " ");

        let resp = app
            .oneshot(multi_chat_request(serde_json::json!({
                "documentIds": [good.id, empty.id],
                "question": "compare them?"
            })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let events = body_events(resp).await;
        let StreamEvent::Token { content } = &events[1] else {
            panic!("expected exclusion notice token");
        };
        assert!(content.contains("scan.pdf"));
        assert_eq!(*events.last().unwrap(), StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_chat_greeting_short_circuit() {
        let gateway = MockGateway::new().with_tokens(["should not run"]);
        let (app, state) = make_app(gateway.clone());
        let doc = seed_document(&state, "report.txt", LONG_CONTENT);

        let resp = app
            .oneshot(chat_request(
                serde_json::json!({"documentId": doc.id, "question": "Hello!"}),
            ))
            .await
            .unwrap();

        let events = body_events(resp).await;
        assert_eq!(events.len(), 3);
        assert_eq!(gateway.generation_calls(), 0);
    }
}
