//! Drugbot Channels - LINE webhook service for the drug guide bot.
//!
//! ## Architecture
//!
//! The service receives LINE webhook events, resolves each text message
//! against the sender's session, and answers through the reply API.
//!
//! ```text
//! LINE → POST /callback → verify → queue → DialogueBridge → DialogueResolver
//!                                               ↓
//! User ←──────────── LineChannel::reply ←── ReplyPayload
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bridge;
pub mod line;
pub mod message;
pub mod routes;
pub mod sweeper;
pub mod traits;

// Re-exports
pub use bridge::DialogueBridge;
pub use line::LineChannel;
pub use message::ChannelMessage;
pub use routes::{build_router, create_state, ChannelsState};
pub use sweeper::spawn_session_sweeper;
pub use traits::{Channel, ChannelError, ChannelResult};

use anyhow::Context;
use drugbot_common::config::Config;
use drugbot_dialogue::{DialogueResolver, DrugTable, SessionStore, SystemClock};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Largest webhook body accepted.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// How long shutdown waits for queued messages to be answered.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the webhook router with body-limit and timeout middleware.
pub fn build_channels_router(
    config: &Config,
    line: Arc<LineChannel>,
) -> (
    axum::Router,
    tokio::sync::mpsc::Receiver<ChannelMessage>,
) {
    let (state, rx) = create_state(line);
    let router = build_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )));

    (router, rx)
}

/// Load the drug table from the configured file, or the built-in content.
pub fn load_drug_table(config: &Config) -> anyhow::Result<DrugTable> {
    match config.dialogue.content_path {
        Some(ref path) => {
            let table = DrugTable::load(path)
                .with_context(|| format!("Failed to load drug content from {}", path.display()))?;
            tracing::info!(path = %path.display(), "Loaded drug content file");
            Ok(table)
        }
        None => DrugTable::builtin().context("Built-in drug content is invalid"),
    }
}

/// Session idle window from the dialogue config.
pub fn session_ttl(config: &Config) -> anyhow::Result<chrono::Duration> {
    i64::try_from(config.dialogue.session_ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .context("dialogue.session_ttl_secs is out of range")
}

/// Wait for the processor to empty its queue, aborting it after `limit`.
async fn drain_processor(handle: tokio::task::JoinHandle<()>, limit: Duration) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(())) => tracing::info!("Message queue drained"),
        Ok(Err(e)) => tracing::error!("Dialogue processor failed: {}", e),
        Err(_) => {
            tracing::warn!(
                timeout_secs = limit.as_secs(),
                "Timed out draining message queue, dropping remaining messages"
            );
            abort.abort();
        }
    }
}

/// Start the webhook server and its background tasks.
///
/// Runs until Ctrl-C, then drains in-flight requests and queued messages
/// before stopping the background tasks.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let table = Arc::new(load_drug_table(config)?);
    let store = Arc::new(SessionStore::new(session_ttl(config)?));
    let clock = Arc::new(SystemClock);

    let line = Arc::new(LineChannel::from_config(&config.line));
    let (router, rx) = build_channels_router(config, line.clone());

    // Create the bridge
    let bridge = Arc::new(DialogueBridge::new(
        DialogueResolver::new(store.clone(), table),
        line,
        clock.clone(),
    ));

    // Spawn the message processor
    let processor_handle = DialogueBridge::spawn_processor(bridge, rx);

    // Spawn cleanup task for expired sessions
    let sweeper_handle = spawn_session_sweeper(
        store,
        clock,
        Duration::from_secs(config.dialogue.sweep_interval_secs),
    );

    tracing::info!(
        session_ttl_secs = config.dialogue.session_ttl_secs,
        "Starting drugbot channels on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router and its queue sender are gone; let the processor finish
    // what LINE has already been told was accepted.
    sweeper_handle.abort();
    drain_processor(processor_handle, SHUTDOWN_DRAIN_TIMEOUT).await;

    tracing::info!("Drugbot channels stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
