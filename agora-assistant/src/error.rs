//! Error types for agora-assistant.
//!
//! Only caller input errors ever reach the HTTP layer. Completion and feed
//! failures are absorbed by the orchestrator and turned into normal replies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Request rejections produced by the assistant's HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Message is too long ({length} characters, limit {limit})")]
    MessageTooLong { length: usize, limit: usize },
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl AssistantError {
    pub fn code(&self) -> &'static str {
        match self {
            AssistantError::EmptyMessage => "EMPTY_MESSAGE",
            AssistantError::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
        }
    }
}

impl IntoResponse for AssistantError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
    }
}
