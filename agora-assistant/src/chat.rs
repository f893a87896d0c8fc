//! Chat orchestration.
//!
//! Executes one conversational turn end to end:
//!
//! ```text
//! message → session lookup → append user turn → instructions + context
//!         → completion call → append reply + truncate   (success)
//!                           → roll back + apology       (failure)
//! ```
//!
//! `handle_message` never returns an error. Every failure becomes a normal
//! reply carrying an apologetic message, and the transcript is left exactly
//! as it was before the call.

use crate::context::ContextAssembler;
use crate::provider::{ChatRequest, Message, Provider};
use crate::session::{Role, SessionStore, Turn};
use agora_common::util::sanitize_for_log;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Fixed persona. Grounding data is appended below it.
pub const PERSONA: &str = "You are Agora Assistant, the helper for the Agora community platform. \
You help members discover communities, find items in the marketplace, and find their way around \
the platform. Keep answers short and friendly. When you talk about specific communities or \
listings, rely on the data provided here; if something is not listed, say you are not sure \
instead of inventing it.";

/// Substituted when the completion API returns no text.
pub const NO_RESPONSE: &str = "No response received";

/// Coarse class of a completion failure, used to pick the reply shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    Quota,
    RateLimit,
    Connectivity,
}

impl FailureKind {
    /// Message returned to the user in place of an answer.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::Auth => {
                "Sorry, the assistant is not configured correctly right now. Please let the site administrators know."
            }
            FailureKind::Quota => {
                "Sorry, the assistant has reached its usage limit for now. Please try again later."
            }
            FailureKind::RateLimit => {
                "Sorry, I'm getting too many requests at the moment. Please wait a few seconds and try again."
            }
            FailureKind::Connectivity => {
                "Sorry, I'm having trouble connecting right now. Please try again in a moment."
            }
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Auth => "auth",
            FailureKind::Quota => "quota",
            FailureKind::RateLimit => "rate_limit",
            FailureKind::Connectivity => "connectivity",
        };
        f.write_str(name)
    }
}

/// Classify a failure from its error text.
///
/// Checks run in order and are case-sensitive: auth, quota, rate limit,
/// then everything else is a connectivity failure.
pub fn classify_failure(error_text: &str) -> FailureKind {
    if error_text.contains("API key") || error_text.contains("401") {
        FailureKind::Auth
    } else if error_text.contains("quota") || error_text.contains("billing") {
        FailureKind::Quota
    } else if error_text.contains("rate") || error_text.contains("429") {
        FailureKind::RateLimit
    } else {
        FailureKind::Connectivity
    }
}

/// Result of one turn, always successful from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f64,
    pub max_history: usize,
    pub context_timeout: Duration,
}

impl ChatSettings {
    pub fn from_config(config: &agora_common::Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_history: config.chat.max_history,
            context_timeout: Duration::from_secs(config.chat.context_timeout_secs),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&agora_common::Config::default())
    }
}

/// Builds prompts, calls the provider, and keeps session transcripts consistent.
#[derive(Clone)]
pub struct ChatOrchestrator {
    sessions: SessionStore,
    context: ContextAssembler,
    provider: Arc<dyn Provider>,
    settings: ChatSettings,
}

impl ChatOrchestrator {
    pub fn new(
        sessions: SessionStore,
        context: ContextAssembler,
        provider: Arc<dyn Provider>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            sessions,
            context,
            provider,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run one turn for `text` in the given (or a new) session.
    pub async fn handle_message(&self, text: &str, session_id: Option<&str>) -> ChatReply {
        let (session_id, handle) = self.sessions.get_or_create(session_id).await;

        // Held for the whole turn: sends to one session are serialized.
        let mut transcript = handle.lock().await;
        let checkpoint = transcript.len();
        transcript.push(Turn::user(text));

        let instructions = self.instructions().await;
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: build_messages(&instructions, transcript.turns()),
            temperature: self.settings.temperature,
        };

        match self.provider.chat(request).await {
            Ok(response) => {
                let content = response
                    .content
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| NO_RESPONSE.to_string());

                transcript.push(Turn::assistant(content.clone()));
                transcript.truncate_front(self.settings.max_history);

                tracing::info!(
                    session_id = %session_id,
                    provider = %response.provider,
                    latency_ms = response.latency_ms,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    total_tokens = response.usage.total_tokens,
                    turns = transcript.len(),
                    "Chat turn completed"
                );

                ChatReply {
                    response: content,
                    session_id,
                }
            }
            Err(e) => {
                transcript.rollback_to(checkpoint);
                let kind = classify_failure(&e.message);

                tracing::warn!(
                    session_id = %session_id,
                    kind = %kind,
                    status = ?e.status_code,
                    error = %sanitize_for_log(&e.to_string()),
                    "Completion failed, transcript rolled back"
                );

                ChatReply {
                    response: kind.user_message().to_string(),
                    session_id,
                }
            }
        }
    }

    /// Forget a session. Always succeeds.
    pub async fn clear_history(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id).await;
        true
    }

    /// Persona plus the live context snapshot, or the persona alone if the
    /// snapshot is empty or could not be built in time.
    async fn instructions(&self) -> String {
        match tokio::time::timeout(self.settings.context_timeout, self.context.build_context())
            .await
        {
            Ok(context) if !context.is_empty() => format!("{}\n\n{}", PERSONA, context),
            Ok(_) => PERSONA.to_string(),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.context_timeout.as_millis() as u64,
                    "Context assembly timed out, using persona only"
                );
                PERSONA.to_string()
            }
        }
    }
}

/// Map transcript turns to outbound messages.
///
/// The target models reject a `system` role, so the instructions are folded
/// into the first user turn as `[instructions]\n\n<content>`.
pub fn build_messages(instructions: &str, turns: &[Turn]) -> Vec<Message> {
    let mut injected = false;

    turns
        .iter()
        .map(|turn| {
            let content = if turn.role == Role::User && !injected {
                injected = true;
                format!("[{}]\n\n{}", instructions, turn.content)
            } else {
                turn.content.clone()
            };

            Message {
                role: turn.role,
                content,
            }
        })
        .collect()
}
