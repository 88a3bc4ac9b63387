//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, known log levels)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::Config;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("{field} must not be empty")]
    EmptyMessage { field: &'static str },

    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeouts.default_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "timeouts.default_ms",
        });
    }
    if config.timeouts.default_error_message.trim().is_empty() {
        errors.push(ValidationError::EmptyMessage {
            field: "timeouts.default_error_message",
        });
    }
    if config.fetch.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            field: "fetch.timeout_ms",
        });
    }
    if config.fetch.default_error_message.trim().is_empty() {
        errors.push(ValidationError::EmptyMessage {
            field: "fetch.default_error_message",
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
