//! Configuration validation for Agora services.
//!
//! Ensures required values are present and within valid ranges before
//! a service starts serving traffic.

use thiserror::Error;

use crate::config::{ChatConfig, Config, FeedsConfig, LlmConfig, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.assistant_port() == 0 {
            errors.push(ValidationError::InvalidPort {
                port: 0,
                field: "services.assistant.port".into(),
            });
        }

        let sections: [&dyn Validate; 4] =
            [&self.llm, &self.feeds, &self.chat, &self.observability];
        for section in sections {
            if let Err(e) = section.validate() {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load configuration, apply environment overrides, and validate.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for LlmConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.base_url".into(),
            });
        }

        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.model".into(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidValue {
                field: "llm.temperature".into(),
                reason: "must be between 0.0 and 2.0".into(),
            });
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for FeedsConfig {
    fn validate(&self) -> ValidationResult<()> {
        if let Some(ref raw) = self.url {
            let parsed = url::Url::parse(raw).map_err(|e| ValidationError::InvalidValue {
                field: "feeds.url".into(),
                reason: e.to_string(),
            })?;

            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ValidationError::InvalidValue {
                    field: "feeds.url".into(),
                    reason: "must use http or https".into(),
                });
            }
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "feeds.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.limit == 0 {
            return Err(ValidationError::InvalidValue {
                field: "feeds.limit".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ChatConfig {
    fn validate(&self) -> ValidationResult<()> {
        // One user turn plus its reply must always fit.
        if self.max_history < 2 {
            return Err(ValidationError::InvalidValue {
                field: "chat.max_history".into(),
                reason: "must be at least 2".into(),
            });
        }

        if self.max_message_chars == 0 {
            return Err(ValidationError::InvalidValue {
                field: "chat.max_message_chars".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.context_timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "chat.context_timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}
