//! Shutdown coordination.

use std::sync::Arc;

use crate::signal::{AbortReason, Signal, SignalController};

/// Reason carried by the shutdown signal.
pub const SHUTDOWN_MESSAGE: &str = "shutdown requested";

/// Coordinator for cooperative shutdown.
///
/// Long-running work takes [`Shutdown::signal`] as one of its external
/// signals and settles as aborted once shutdown is triggered.
#[derive(Debug, Clone)]
pub struct Shutdown {
    controller: Arc<SignalController>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            controller: Arc::new(SignalController::new()),
        }
    }

    /// Observer handle for the shutdown signal.
    pub fn signal(&self) -> Signal {
        self.controller.signal()
    }

    /// Fire the shutdown signal. Returns false if it had already fired.
    pub fn trigger(&self) -> bool {
        let fired = self
            .controller
            .abort_with(AbortReason::aborted_with(SHUTDOWN_MESSAGE));
        if fired {
            tracing::info!("Shutdown triggered");
        }
        fired
    }

    pub fn is_triggered(&self) -> bool {
        self.controller.is_fired()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
