//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never formatted-in values
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
