//! Metrics collection.
//!
//! # Metrics
//! - `cancel_bus_outcomes_total` (counter): settled timed operations by kind
//! - `cancel_bus_signals_fired_total` (counter): signal transitions by reason
//! - `cancel_bus_emits_total` (counter): event bus emissions
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the binary decides on an exporter
//! - Without an installed recorder every call is a no-op

use metrics::counter;

/// Record a settled `run_with_timeout` call.
pub fn record_outcome(kind: &'static str) {
    counter!("cancel_bus_outcomes_total", "kind" => kind).increment(1);
}

/// Record a signal moving from pending to fired.
pub fn record_signal_fired(reason: &'static str) {
    counter!("cancel_bus_signals_fired_total", "reason" => reason).increment(1);
}

/// Record an event bus emission.
pub fn record_emit() {
    counter!("cancel_bus_emits_total").increment(1);
}
