//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DEFAULT_ERROR_MESSAGE;
use crate::signal::timeout::DEFAULT_TIMEOUT_MESSAGE;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Defaults for `run_with_timeout`.
    pub timeouts: TimeoutConfig,

    /// Defaults for the network request adapter.
    pub fetch: FetchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Timed execution defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline in milliseconds.
    pub default_ms: u64,

    /// Message carried by the timeout error.
    pub default_error_message: String,
}

impl TimeoutConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_ms: 5000,
            default_error_message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
        }
    }
}

/// Network request adapter defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Deadline in milliseconds.
    pub timeout_ms: u64,

    /// Message used when the response body is empty.
    pub default_error_message: String,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            default_error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
