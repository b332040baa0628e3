//! Configuration validation for the drug guide bot.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{Config, DialogueConfig, LineConfig, ObservabilityConfig, ServerConfig};

/// Longest idle window a session may be configured to survive (7 days).
pub const MAX_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;

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
        let sections: [&dyn Validate; 4] = [
            &self.server,
            &self.line,
            &self.dialogue,
            &self.observability,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }

        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "server.host".into(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "server.request_timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

impl Validate for LineConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.channel_access_token.is_empty() {
            return Err(ValidationError::MissingField {
                field: "line.channel_access_token".into(),
            });
        }

        if self.channel_secret.is_empty() {
            return Err(ValidationError::MissingField {
                field: "line.channel_secret".into(),
            });
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(ValidationError::InvalidValue {
                field: "line.api_base".into(),
                reason: "must start with http:// or https://".into(),
            });
        }

        Ok(())
    }
}

impl Validate for DialogueConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.session_ttl_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "dialogue.session_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ValidationError::InvalidValue {
                field: "dialogue.session_ttl_secs".into(),
                reason: format!("must be at most {MAX_SESSION_TTL_SECS}"),
            });
        }

        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "dialogue.sweep_interval_secs".into(),
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
