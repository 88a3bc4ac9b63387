//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! run_with_timeout(operation, options):
//!     → timeout source (signal::timeout) + external signals
//!     → signal::combine (one derived signal)
//!     → race operation against the derived signal
//!     → Outcome { Success | Failure(Timeout | Aborted | Wrapped ...) }
//!     → on timeout: TimeoutSink (events::notify)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every wrapped call has a deadline
//! - Cancellation is cooperative: the losing future is dropped, not preempted
//! - Cleanup runs on every settlement path

pub mod timeouts;

pub use timeouts::{abort_process, run_with_timeout, AbortProcessOptions, Outcome, RunOptions};
