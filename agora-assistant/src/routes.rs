//! HTTP routes for the assistant.

use crate::chat::{ChatOrchestrator, ChatReply};
use crate::error::AssistantError;
use agora_common::logging::trace_id_from_headers;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
    pub max_message_chars: usize,
}

/// Send-message request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Clear-history request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub sessions: usize,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/chat", post(send_message))
        .route("/api/chat/clear", post(clear_history))
        .with_state(state)
}

// ============ Health Check ============

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "agora-assistant".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.orchestrator.sessions().len().await,
    })
}

// ============ Chat ============

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Json<ChatReply>, AssistantError> {
    let trace_id = trace_id_from_headers(&headers);

    if request.message.trim().is_empty() {
        return Err(AssistantError::EmptyMessage);
    }

    let length = request.message.chars().count();
    if length > state.max_message_chars {
        return Err(AssistantError::MessageTooLong {
            length,
            limit: state.max_message_chars,
        });
    }

    let session_id = request.session_id.as_deref().filter(|id| !id.is_empty());

    tracing::debug!(
        trace_id = %trace_id,
        session_id = ?session_id,
        chars = length,
        "Chat message received"
    );

    let reply = state
        .orchestrator
        .handle_message(&request.message, session_id)
        .await;

    Ok(Json(reply))
}

async fn clear_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ClearRequest>,
) -> Json<ClearResponse> {
    let success = state.orchestrator.clear_history(&request.session_id).await;

    tracing::debug!(
        trace_id = %trace_id_from_headers(&headers),
        session_id = %request.session_id,
        "Chat history cleared"
    );

    Json(ClearResponse { success })
}
