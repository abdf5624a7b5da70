//! Ollama HTTP client: model listing, blocking generation, and streaming
//! generation over newline-delimited JSON.
//!
//! Streaming is modeled as a task + channel: the relay task reads the
//! response body and forwards incremental tokens into an mpsc channel.
//! Dropping the receiver cancels the relay and releases the connection.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use docuchat_core::config::GatewayConfig;

/// Channel capacity for the token relay. Small: tokens are consumed as fast
/// as they are produced, backpressure just slows the body read.
const TOKEN_CHANNEL_CAPACITY: usize = 32;

/// Receiving end of a streaming generation call. Each item is one
/// incremental token, or the error that ended the stream.
pub type TokenReceiver = mpsc::Receiver<Result<String, GatewayError>>;

/// Errors from the language-model gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Connection(#[from] reqwest::Error),
    #[error("gateway returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("gateway response malformed: {0}")]
    InvalidResponse(String),
}

/// One available model as reported by `GET /api/tags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    #[serde(rename = "modified_at")]
    pub modified_at: Option<String>,
}

/// The language-model service as seen by the chat core.
///
/// The orchestrator is written against this trait so tests can substitute
/// [`crate::MockGateway`] and assert on call counts.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// List the models the gateway can serve.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError>;

    /// Run a generation to completion and return the full response text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GatewayError>;

    /// Open a streaming generation call.
    ///
    /// Returns a receiver of incremental tokens. A non-success HTTP status
    /// fails here, before any token; transport failures mid-stream arrive
    /// in-band as the final channel item.
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<TokenReceiver, GatewayError>;
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One line of the newline-delimited generation stream. Ollama sends a JSON
/// object per line, with an optional incremental `response` fragment and a
/// `done` flag on the final line.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Parse one stream line. Malformed lines yield `None` and are skipped by
/// the caller; a bad line must never kill the stream.
fn parse_stream_line(line: &str) -> Option<GenerateChunk> {
    match serde_json::from_str::<GenerateChunk>(line) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            debug!(error = %e, "Skipping malformed gateway stream line");
            None
        }
    }
}

// =============================================================================
// OllamaGateway
// =============================================================================

/// Production gateway speaking the Ollama HTTP API.
pub struct OllamaGateway {
    client: reqwest::Client,
    base_url: String,
    /// Timeout applied to short auxiliary requests such as listing models.
    request_timeout: Duration,
}

impl OllamaGateway {
    /// Build a gateway from configuration.
    ///
    /// The client carries a short connect timeout and a generous read
    /// timeout, since model generation can stall for a long time between
    /// tokens without being dead.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        let message = message.chars().take(200).collect();
        Err(GatewayError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(tags.models)
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            })
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let chunk: GenerateChunk = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(chunk.response.unwrap_or_default())
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<TokenReceiver, GatewayError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: true,
            })
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let (tx, rx) = mpsc::channel(TOKEN_CHANNEL_CAPACITY);
        tokio::spawn(relay_stream(response, tx));
        Ok(rx)
    }
}

/// Read the newline-delimited body and forward tokens into the channel.
///
/// Ends when the gateway reports `done`, the body ends, the transport
/// fails (forwarded as an error item), or the receiver is dropped.
async fn relay_stream(response: reqwest::Response, tx: mpsc::Sender<Result<String, GatewayError>>) {
    let mut body = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(result) = body.next().await {
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Gateway stream read failed");
                let _ = tx.send(Err(GatewayError::Connection(e))).await;
                return;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim().to_string();
            buffer.drain(..=pos);
            if line.is_empty() {
                continue;
            }
            let Some(chunk) = parse_stream_line(&line) else {
                continue;
            };
            if let Some(token) = chunk.response {
                if !token.is_empty() && tx.send(Ok(token)).await.is_err() {
                    // Receiver dropped: the caller went away, stop reading.
                    return;
                }
            }
            if chunk.done {
                return;
            }
        }
    }

    // A final line without a trailing newline still counts.
    let line = buffer.trim();
    if !line.is_empty() {
        if let Some(chunk) = parse_stream_line(line) {
            if let Some(token) = chunk.response {
                if !token.is_empty() {
                    let _ = tx.send(Ok(token)).await;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
