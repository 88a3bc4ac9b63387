//! Deadline-driven signals.
//!
//! # Responsibilities
//! - Fire a signal with a timeout reason once a deadline elapses
//! - Let the owner fire early or clear the timer
//!
//! # Design Decisions
//! - The timer is a Tokio task; clearing or dropping the source aborts it
//! - Must be created from within a Tokio runtime

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::signal::broadcast::{AbortReason, Signal};

/// Deadline used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Reason message used when the caller does not pick one.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "Time Out Async Proces";

/// A signal that fires after a deadline, or earlier on demand.
#[derive(Debug)]
pub struct TimeoutSignal {
    signal: Signal,
    timeout: Duration,
    timer: JoinHandle<()>,
    cleared: AtomicBool,
}

impl TimeoutSignal {
    /// Start a timer that fires the signal with `message` after `timeout`.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn new(timeout: Duration, message: impl Into<String>) -> Self {
        let signal = Signal::pending();
        let message = message.into();
        let timer_signal = signal.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if timer_signal.fire(AbortReason::timeout(message)) {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Deadline elapsed");
            }
        });

        Self {
            signal,
            timeout,
            timer,
            cleared: AtomicBool::new(false),
        }
    }

    /// Observer handle for the deadline signal.
    pub fn signal(&self) -> Signal {
        self.signal.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_fired(&self) -> bool {
        self.signal.is_fired()
    }

    /// Fire now with an abort reason and release the timer.
    pub fn abort(&self) -> bool {
        self.clear();
        self.signal.fire(AbortReason::aborted())
    }

    /// Release the timer without firing. Idempotent.
    pub fn clear(&self) {
        if !self.cleared.swap(true, Ordering::AcqRel) {
            self.timer.abort();
            tracing::trace!("Deadline timer cleared");
        }
    }

    /// True while the timer may still fire the signal.
    pub fn is_armed(&self) -> bool {
        !self.cleared.load(Ordering::Acquire) && !self.signal.is_fired()
    }
}

impl Drop for TimeoutSignal {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Create a deadline signal, defaulting the message to
/// [`DEFAULT_TIMEOUT_MESSAGE`].
pub fn create_signal(timeout: Duration, message: Option<&str>) -> TimeoutSignal {
    TimeoutSignal::new(timeout, message.unwrap_or(DEFAULT_TIMEOUT_MESSAGE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_deadline() {
        let source = create_signal(Duration::from_millis(1000), None);
        let signal = source.signal();

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(!signal.is_fired());
        assert!(source.is_armed());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            signal.reason(),
            Some(AbortReason::timeout(DEFAULT_TIMEOUT_MESSAGE))
        );
        assert!(!source.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_releases_timer() {
        let source = create_signal(Duration::from_millis(100), Some("custom"));
        source.clear();
        assert!(!source.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!source.is_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_timer() {
        let source = create_signal(Duration::from_millis(100), None);
        let signal = source.signal();
        drop(source);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!signal.is_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_on_demand() {
        let source = create_signal(Duration::from_millis(100), None);
        assert!(source.abort());
        assert!(!source.abort());
        assert_eq!(source.signal().reason(), Some(AbortReason::aborted()));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.signal().reason(), Some(AbortReason::aborted()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_future_waits_for_deadline() {
        let source = create_signal(Duration::from_millis(250), Some("slow"));
        let started = tokio::time::Instant::now();

        let reason = source.signal().fired().await;
        assert_eq!(reason, AbortReason::timeout("slow"));
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(started.elapsed() < Duration::from_millis(260));
    }
}
