//! Configuration management for Agora services.
//!
//! Services share a configuration file at `~/.agora/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (AGORA_* prefix, plus provider key fallbacks)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `AGORA_ASSISTANT_PORT` → services.assistant.port
//! - `AGORA_BIND_ADDRESS` → network.bind
//! - `AGORA_LOG_LEVEL` → observability.log_level
//! - `AGORA_LLM_MODEL` → llm.model
//! - `AGORA_LLM_BASE_URL` → llm.base_url
//! - `LLM_API_KEY` / `OPENROUTER_API_KEY` → secrets.llm_api_key
//! - `AGORA_FEEDS_URL` → feeds.url
//! - `AGORA_FEEDS_API_KEY` → secrets.feeds_api_key

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".agora"),
        |dirs| dirs.home_dir().join(".agora"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network / Services
// ============================================================================

/// Global network configuration.
///
/// Default bind is `127.0.0.1` (local only). Set to `0.0.0.0` to allow remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

/// Service port configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    /// Chat assistant service
    #[serde(default)]
    pub assistant: ServicePortConfig,
}

/// Individual service port configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicePortConfig {
    #[serde(default)]
    pub port: Option<u16>,
}

// ============================================================================
// Secrets
// ============================================================================

/// Credentials. Never logged.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// Bearer key for the completion API
    #[serde(default)]
    pub llm_api_key: Option<String>,

    /// Key for the community data REST endpoint (sent as `apikey` and bearer)
    #[serde(default)]
    pub feeds_api_key: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "***"))
            .field("feeds_api_key", &self.feeds_api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

// ============================================================================
// LLM
// ============================================================================

/// Completion API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout for a single completion call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

// ============================================================================
// Feeds
// ============================================================================

/// Community data source (PostgREST-style endpoint of the managed database).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`. Unset means no grounding data.
    #[serde(default)]
    pub url: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_feeds_timeout")]
    pub timeout_secs: u64,

    /// Maximum records fetched per feed
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_feeds_timeout(),
            limit: default_feed_limit(),
        }
    }
}

// ============================================================================
// Chat
// ============================================================================

/// Conversation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Maximum turns kept per session transcript
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Longest accepted inbound message, in characters
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Upper bound for assembling the grounding context
    #[serde(default = "default_context_timeout")]
    pub context_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            max_message_chars: default_max_message_chars(),
            context_timeout_secs: default_context_timeout(),
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets lowered to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure for Agora services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub feeds: FeedsConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// Runs before logging is initialized, so it does not log; callers
    /// report [`config_path`] once a subscriber is installed.
    pub fn load() -> Result<Self> {
        Self::load_from_or_default(&config_path())
    }

    /// Load from `path`, or fall back to defaults when the file is absent.
    pub fn load_from_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("AGORA_ASSISTANT_PORT") {
            if let Ok(p) = port.parse() {
                self.services.assistant.port = Some(p);
            }
        }

        if let Some(bind) = lookup("AGORA_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Some(level) = lookup("AGORA_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Some(model) = lookup("AGORA_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Some(url) = lookup("AGORA_LLM_BASE_URL") {
            self.llm.base_url = url;
        }

        if let Some(key) = lookup("LLM_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY")) {
            self.secrets.llm_api_key = Some(key);
        }

        if let Some(url) = lookup("AGORA_FEEDS_URL") {
            self.feeds.url = Some(url);
        }

        if let Some(key) = lookup("AGORA_FEEDS_API_KEY") {
            self.secrets.feeds_api_key = Some(key);
        }
    }

    /// Get the effective bind address.
    pub fn bind_address(&self) -> &str {
        &self.network.bind
    }

    /// Get the assistant service port.
    pub fn assistant_port(&self) -> u16 {
        self.services.assistant.port.unwrap_or(4440)
    }

    /// Get the assistant endpoint URL, e.g. "http://127.0.0.1:4440".
    pub fn assistant_endpoint(&self) -> String {
        format!("http://{}:{}", self.bind_address(), self.assistant_port())
    }

    /// Completion API key, ignoring empty strings.
    pub fn llm_api_key(&self) -> Option<&str> {
        self.secrets
            .llm_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_llm_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

fn default_llm_model() -> String {
    "google/gemma-3-27b-it:free".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_feeds_timeout() -> u64 {
    5
}

fn default_feed_limit() -> usize {
    20
}

fn default_max_history() -> usize {
    20
}

fn default_max_message_chars() -> usize {
    4000
}

fn default_context_timeout() -> u64 {
    8
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}
