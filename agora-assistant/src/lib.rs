//! Agora Assistant - conversational helper for the Agora community platform.
//!
//! This crate provides the assistant service:
//! - Bounded per-session conversation history
//! - Live grounding context from the community and marketplace feeds
//! - One completion call per message, with failures turned into friendly replies
//!
//! ## Architecture
//!
//! ```text
//! Client → /api/chat → ChatOrchestrator → SessionStore (transcript)
//!                            ↓
//!               ContextAssembler (feeds) → Provider (completion API)
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chat;
pub mod context;
pub mod error;
pub mod feeds;
pub mod provider;
pub mod routes;
pub mod session;

pub use chat::{ChatOrchestrator, ChatReply, ChatSettings, FailureKind};
pub use context::ContextAssembler;
pub use error::AssistantError;
pub use feeds::{CommunityFeed, ListingFeed};
pub use provider::{CompatibleProvider, Provider, ProviderError};
pub use routes::AppState;
pub use session::SessionStore;

use agora_common::config::Config;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Wire the orchestrator from config: REST feeds (or empty ones) and the
/// OpenAI-compatible completion client.
pub fn build_state(config: &Config) -> AppState {
    let provider: Arc<dyn Provider> = Arc::new(CompatibleProvider::from_config(config));
    build_state_with(config, provider)
}

/// Same as [`build_state`] with an explicit completion provider.
pub fn build_state_with(config: &Config, provider: Arc<dyn Provider>) -> AppState {
    let (communities, listings) = feeds::feeds_from_config(config);
    let context = ContextAssembler::new(communities, listings, config.feeds.limit);

    AppState {
        orchestrator: ChatOrchestrator::new(
            SessionStore::new(),
            context,
            provider,
            ChatSettings::from_config(config),
        ),
        max_message_chars: config.chat.max_message_chars,
    }
}

/// Apply CORS and the body limit to the assistant routes.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::build_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
}

/// Start the assistant server and run until Ctrl-C.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.bind_address().parse::<std::net::IpAddr>()?,
        config.assistant_port(),
    ));

    if config.llm_api_key().is_none() {
        tracing::warn!("No LLM API key configured, every chat message will get the setup apology");
    }

    let app = build_app(build_state(config));

    tracing::info!(model = %config.llm.model, "Starting Agora Assistant on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Agora Assistant stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
