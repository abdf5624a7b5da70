//! Scriptable in-memory gateway for tests.
//!
//! Plays back configured token sequences or failures and counts generation
//! calls, so orchestrator tests can assert that refusal and greeting paths
//! never reach the model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::client::{GatewayError, ModelGateway, ModelInfo, TokenReceiver};

/// A fake [`ModelGateway`] that returns scripted output.
#[derive(Clone, Default)]
pub struct MockGateway {
    tokens: Vec<String>,
    response: String,
    models: Vec<ModelInfo>,
    fail_status: Option<u16>,
    generate_calls: Arc<AtomicUsize>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream these tokens, in order, from `generate_stream`.
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Return this full text from the non-streaming `generate`.
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    /// Advertise these models from `list_models`.
    pub fn with_models(mut self, names: &[&str]) -> Self {
        self.models = names
            .iter()
            .map(|n| ModelInfo {
                name: n.to_string(),
                size: None,
                modified_at: None,
            })
            .collect();
        self
    }

    /// Fail every generation call with this HTTP status.
    pub fn failing_with_status(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    /// Number of generation calls (streaming and blocking) made so far.
    pub fn generation_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    fn status_error(status: u16) -> GatewayError {
        GatewayError::Status {
            status,
            message: "mock failure".to_string(),
        }
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        Ok(self.models.clone())
    }

    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GatewayError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_status {
            return Err(Self::status_error(status));
        }
        Ok(self.response.clone())
    }

    async fn generate_stream(
        &self,
        _model: &str,
        _prompt: &str,
    ) -> Result<TokenReceiver, GatewayError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.fail_status {
            return Err(Self::status_error(status));
        }

        let (tx, rx) = mpsc::channel(32);
        let tokens = self.tokens.clone();
        tokio::spawn(async move {
            for token in tokens {
                if tx.send(Ok(token)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_streams_scripted_tokens() {
        let gateway = MockGateway::new().with_tokens(["Hello", " world"]);
        let mut rx = gateway.generate_stream("m", "p").await.unwrap();

        let mut collected = String::new();
        while let Some(item) = rx.recv().await {
            collected.push_str(&item.unwrap());
        }
        assert_eq!(collected, "Hello world");
        assert_eq!(gateway.generation_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_fails_with_status() {
        let gateway = MockGateway::new().failing_with_status(502);
        let err = gateway.generate_stream("m", "p").await.unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let gateway = MockGateway::new().with_response("done");
        assert_eq!(gateway.generation_calls(), 0);
        gateway.generate("m", "p").await.unwrap();
        gateway.generate("m", "p").await.unwrap();
        assert_eq!(gateway.generation_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_lists_models() {
        let gateway = MockGateway::new().with_models(&["llama2", "mistral"]);
        let models = gateway.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "llama2");
    }
}
