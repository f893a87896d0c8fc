//! Error types for Agora services.

use thiserror::Error;

/// Result type alias using the Agora error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Agora services.
#[derive(Error, Debug)]
pub enum Error {
    /// External service error
    #[error("External service error: {0}")]
    External(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is a timeout, looking through context wrappers.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::WithContext { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
