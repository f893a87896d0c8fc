//! Agora Common - Shared types, utilities, and configuration for Agora services.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - Small string utilities for log output

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    ChatConfig, Config, FeedsConfig, LlmConfig, NetworkConfig, ObservabilityConfig,
    SecretsConfig, ServicesConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
