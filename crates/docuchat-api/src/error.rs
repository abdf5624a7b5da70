//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.
//! These mappings cover the pre-stream failures only; once an SSE stream
//! has opened, errors travel in-band as `error` events.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use docuchat_chat::ChatError;
use docuchat_core::error::DocuChatError;
use docuchat_extract::ExtractError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DocuChatError> for ApiError {
    fn from(err: DocuChatError) -> Self {
        match &err {
            DocuChatError::Config(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::EmptyQuestion
            | ChatError::MissingDocumentIds
            | ChatError::NoModelAvailable => ApiError::BadRequest(err.to_string()),
            ChatError::DocumentNotFound(_) | ChatError::ConversationNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ChatError::Gateway(_) | ChatError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        match &err {
            ExtractError::UnsupportedType(_) | ExtractError::Encoding(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ExtractError::Pdf(_) | ExtractError::Ooxml(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}
