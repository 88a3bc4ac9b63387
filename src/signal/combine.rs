//! Signal combinator.
//!
//! # Responsibilities
//! - Merge several signals into one derived signal
//! - Fire the derived signal on the first input that fires
//! - Detach from every input once resolved or released
//!
//! # Design Decisions
//! - Inputs already fired at call time short-circuit: no listener is attached
//! - A shared `resolved` flag makes the first fire win; later fires are no-ops
//! - Input listeners hold the shared state weakly, the derived signal holds it
//!   strongly, so dropping the derived signal releases every input listener

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::Error;
use crate::signal::broadcast::{AbortReason, ListenerId, Signal, SignalController, WeakSignal};
use crate::signal::timeout::TimeoutSignal;

/// One listener registration on one input.
struct Link {
    source: WeakSignal,
    id: ListenerId,
}

struct CombineState {
    resolved: AtomicBool,
    derived: WeakSignal,
    links: Mutex<Vec<Link>>,
}

impl CombineState {
    fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    fn resolve(&self, reason: &AbortReason) {
        if self.resolved.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(derived) = self.derived.upgrade() {
            derived.fire(reason.clone());
        }
        self.detach_all();
    }

    fn detach_all(&self) {
        let links = std::mem::take(&mut *self.links.lock().expect("combinator mutex poisoned"));
        for link in links {
            if let Some(source) = link.source.upgrade() {
                source.unobserve(link.id);
            }
        }
    }
}

/// Keeps the combinator state alive for as long as the derived signal lives.
pub(crate) struct Upstream(Arc<CombineState>);

impl Drop for Upstream {
    fn drop(&mut self) {
        self.0.detach_all();
    }
}

/// Merge `signals` into one signal that fires when any of them fires.
///
/// The derived signal carries the reason of the input that fired first. An
/// empty list yields a signal that never fires.
pub fn combine(signals: &[Signal]) -> Signal {
    if let Some(reason) = signals.iter().find_map(Signal::reason) {
        tracing::debug!(
            inputs = signals.len(),
            reason = %reason,
            "Input already fired, derived signal starts fired"
        );
        return Signal::fired_with(reason);
    }

    let derived = Signal::pending();
    if signals.is_empty() {
        return derived;
    }

    let state = Arc::new(CombineState {
        resolved: AtomicBool::new(false),
        derived: derived.downgrade(),
        links: Mutex::new(Vec::with_capacity(signals.len())),
    });

    for source in signals {
        if state.is_resolved() {
            break;
        }

        let weak: Weak<CombineState> = Arc::downgrade(&state);
        let registration = source.observe(move |reason| {
            if let Some(state) = weak.upgrade() {
                state.resolve(reason);
            }
        });

        match registration {
            Some(id) => state
                .links
                .lock()
                .expect("combinator mutex poisoned")
                .push(Link {
                    source: source.downgrade(),
                    id,
                }),
            None => {
                // Fired between the short-circuit check and registration.
                if let Some(reason) = source.reason() {
                    state.resolve(&reason);
                }
                break;
            }
        }
    }

    // Links pushed while another thread was resolving.
    if state.is_resolved() {
        state.detach_all();
    }

    tracing::trace!(inputs = signals.len(), "Signals combined");
    derived.set_upstream(Upstream(state));
    derived
}

/// Dynamically typed variant of [`combine`].
///
/// Accepts [`Signal`], [`SignalController`] and [`TimeoutSignal`] elements.
/// Any other element fails the whole call before a listener is attached.
pub fn combine_any(items: &[&dyn Any]) -> Result<Signal, Error> {
    let mut signals = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        signals.push(as_signal(*item).ok_or_else(|| Error::InvalidSignal {
            index,
            found: describe(*item).to_string(),
        })?);
    }
    Ok(combine(&signals))
}

fn as_signal(item: &dyn Any) -> Option<Signal> {
    if let Some(signal) = item.downcast_ref::<Signal>() {
        return Some(signal.clone());
    }
    if let Some(controller) = item.downcast_ref::<SignalController>() {
        return Some(controller.signal());
    }
    item.downcast_ref::<TimeoutSignal>().map(TimeoutSignal::signal)
}

fn describe(item: &dyn Any) -> &'static str {
    if item.is::<String>() || item.is::<&str>() {
        "a string"
    } else if item.is::<i32>() || item.is::<i64>() || item.is::<u64>() || item.is::<f64>() {
        "a number"
    } else {
        "an unsupported value"
    }
}
