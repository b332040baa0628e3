//! Configuration management for the drug guide bot.
//!
//! The service reads a single configuration file at `~/.drugbot/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `DRUGBOT_CONFIG` → alternate config file path
//! - `CHANNEL_ACCESS_TOKEN` → line.channel_access_token
//! - `CHANNEL_SECRET` → line.channel_secret
//! - `PORT` → server.port
//! - `DRUGBOT_HOST` → server.host
//! - `DRUGBOT_CONTENT_PATH` → dialogue.content_path
//! - `DRUGBOT_LOG_LEVEL` → observability.log_level
//! - `DRUGBOT_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".drugbot"),
        |dirs| dirs.home_dir().join(".drugbot"),
    )
}

/// Get the configuration file path.
///
/// `DRUGBOT_CONFIG` takes precedence over the default location.
pub fn config_path() -> PathBuf {
    std::env::var("DRUGBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default: "0.0.0.0"
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port. Default: 5000
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// ============================================================================
// LINE Configuration
// ============================================================================

/// LINE Messaging API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Long-lived channel access token (Bearer token for the reply API)
    #[serde(default)]
    pub channel_access_token: String,

    /// Channel secret used to verify `X-Line-Signature`
    #[serde(default)]
    pub channel_secret: String,

    /// Messaging API base URL (overridable for tests and proxies)
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_access_token: String::new(),
            channel_secret: String::new(),
            api_base: default_line_api_base(),
        }
    }
}

// ============================================================================
// Dialogue Configuration
// ============================================================================

/// Session and content settings for the dialogue core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Idle time after which a user's selection is forgotten
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Interval of the background expired-session sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Optional JSON content file replacing the built-in drug table
    #[serde(default)]
    pub content_path: Option<PathBuf>,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            content_path: None,
        }
    }
}

// ============================================================================
// Observability Configuration
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

    /// Additional module targets to exclude from logging.
    ///
    /// These modules will be set to `warn` level to reduce noise.
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
// Root Configuration
// ============================================================================

/// Root configuration for the drug guide bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub line: LineConfig,

    #[serde(default)]
    pub dialogue: DialogueConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using a custom variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = token;
        }
        if let Some(secret) = lookup("CHANNEL_SECRET") {
            self.line.channel_secret = secret;
        }

        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring unparsable PORT"),
            }
        }
        if let Some(host) = lookup("DRUGBOT_HOST") {
            self.server.host = host;
        }

        if let Some(path) = lookup("DRUGBOT_CONTENT_PATH") {
            self.dialogue.content_path = Some(PathBuf::from(path));
        }

        if let Some(level) = lookup("DRUGBOT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("DRUGBOT_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_request_timeout() -> u64 {
    30
}
fn default_line_api_base() -> String {
    "https://api.line.me".into()
}
fn default_session_ttl() -> u64 {
    30 * 60
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
