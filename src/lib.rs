//! Cancellation signals, timed execution and a typed event bus.
//!
//! ```text
//!  signal ──► combine ──► resilience::timeouts ──► Outcome<T>
//!                              │
//!                              └──► events (TimeoutSink) ──► subscribers
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod signal;

pub use config::Config;
pub use error::{cast_error, Error, ErrorKind, Thrown};
pub use events::{CoreEvent, CoreEventKey, EventBus, EventMap, TimeoutNotice, TimeoutSink};
pub use lifecycle::Shutdown;
pub use resilience::timeouts::{abort_process, run_with_timeout, AbortProcessOptions, Outcome, RunOptions};
pub use signal::{combine, combine_any, create_signal, AbortReason, Signal, SignalController, TimeoutSignal};
