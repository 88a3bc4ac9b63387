//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → shared abort signal fires → in-flight timed operations
//!     settle as aborted
//!
//! Signals (signals.rs):
//!     SIGINT / SIGTERM → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Shutdown is just another abort signal, so it composes with deadlines
//! - Triggering twice is a no-op

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
