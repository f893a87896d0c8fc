//! Agora Assistant - Main entry point.

use agora_common::config::{config_path, Config};
use agora_common::logging::init_logging_with_exclusions;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_and_validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Agora Assistant v{}", env!("CARGO_PKG_VERSION"));

    let path = config_path();
    if path.exists() {
        tracing::info!(path = %path.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %path.display(), "Config file not found, using defaults");
    }

    agora_assistant::start_server(&config).await
}
