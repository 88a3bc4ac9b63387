//! Cancellation signal subsystem.
//!
//! # Data Flow
//! ```text
//! Deadline (timeout.rs):
//!     Tokio timer elapses
//!     → fire signal with a timeout reason
//!
//! On demand (broadcast.rs):
//!     SignalController::abort
//!     → fire signal with an abort reason
//!
//! Fan-in (combine.rs):
//!     [deadline, user abort, ...]
//!     → first input to fire fires the derived signal
//!     → listeners on the other inputs are detached
//! ```
//!
//! # Design Decisions
//! - A signal fires at most once; later fires are no-ops
//! - Observers hold `Signal`, only the producer holds the means to fire
//! - Listener cleanup happens on every path, including drop

pub mod broadcast;
pub mod combine;
pub mod timeout;

pub use self::broadcast::{AbortReason, Fired, ListenerId, Signal, SignalController};
pub use self::combine::{combine, combine_any};
pub use self::timeout::{create_signal, TimeoutSignal};
