//! Conversation session store.
//!
//! Maps opaque session ids to bounded transcripts. Sessions live in memory
//! for the lifetime of the process; there is no expiry.
//!
//! Each transcript sits behind its own async mutex. The orchestrator holds
//! that lock for a whole turn, which serializes concurrent sends to one
//! session without blocking other sessions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered turns of one session, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Evict the oldest turns until at most `max_len` remain.
    pub fn truncate_front(&mut self, max_len: usize) {
        if self.turns.len() > max_len {
            let excess = self.turns.len() - max_len;
            self.turns.drain(..excess);
        }
    }

    /// Drop every turn after the first `len`, restoring an earlier state.
    pub fn rollback_to(&mut self, len: usize) {
        self.turns.truncate(len);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Shared handle to one session's transcript.
pub type SessionHandle = Arc<Mutex<Transcript>>;

/// Process-wide session registry.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a session, allocating a fresh one for a missing or unknown id.
    pub async fn get_or_create(&self, session_id: Option<&str>) -> (String, SessionHandle) {
        if let Some(id) = session_id {
            if let Some(handle) = self.sessions.read().await.get(id) {
                return (id.to_string(), Arc::clone(handle));
            }
        }

        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = generate_session_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let handle: SessionHandle = Arc::new(Mutex::new(Transcript::new()));
        sessions.insert(id.clone(), Arc::clone(&handle));

        tracing::debug!(
            session_id = %id,
            requested = ?session_id,
            "Session created"
        );

        (id, handle)
    }

    /// Look up an existing session.
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Append a turn to a session. Returns `false` if the session is unknown.
    pub async fn append(&self, session_id: &str, turn: Turn) -> bool {
        let Some(handle) = self.get(session_id).await else {
            return false;
        };
        handle.lock().await.push(turn);
        true
    }

    /// Cap a session's transcript at `max_len` turns, evicting the oldest.
    pub async fn truncate(&self, session_id: &str, max_len: usize) {
        if let Some(handle) = self.get(session_id).await {
            handle.lock().await.truncate_front(max_len);
        }
    }

    /// Remove a session. Absent ids are ignored.
    pub async fn clear(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            tracing::debug!(session_id = %session_id, "Session cleared");
        }
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Generate a session id from the current time and a random suffix.
fn generate_session_id() -> String {
    let timestamp = Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    format!("session-{}-{}", timestamp, random)
}
