//! Drugbot Common - Shared configuration, errors, and logging for the drug guide bot.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers
//! - Utility functions used across the bot crates

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{Config, DialogueConfig, LineConfig, ObservabilityConfig, ServerConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
