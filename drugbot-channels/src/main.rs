//! Drugbot Channels - Main entry point.

use anyhow::{Context, Result};
use drugbot_channels::start_server;
use drugbot_common::config::Config;
use drugbot_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    config.validate().context("Invalid configuration")?;

    tracing::info!("Drugbot Channels v{}", env!("CARGO_PKG_VERSION"));

    // Start the HTTP server
    start_server(&config).await
}
