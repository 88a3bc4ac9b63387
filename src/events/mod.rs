//! Event dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! emit(event)
//!     → key = event.key()
//!     → snapshot of handlers[key], invoked in registration order
//!     → snapshot of wildcard handlers, invoked with (key, event)
//!
//! Timeout side channel (notify.rs):
//!     run_with_timeout hits its deadline
//!     → TimeoutSink::timed_out
//!     → EventBus::emit(TimeoutError)
//! ```
//!
//! # Design Decisions
//! - Each bus owns its registry; there is no global bus
//! - Handlers run synchronously on the emitting task

pub mod bus;
pub mod notify;

pub use bus::{EventBus, EventMap, Handler, WildcardHandler};
pub use notify::{CoreEvent, CoreEventKey, TimeoutNotice, TimeoutSink};
