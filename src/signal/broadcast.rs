//! Single-fire broadcast signal.
//!
//! # Responsibilities
//! - Hold the `pending -> fired` state and the reason it fired
//! - Notify every attached listener exactly once
//! - Let observers detach before the signal fires
//!
//! # Design Decisions
//! - The listener list is taken out of the lock before listeners run, so a
//!   listener may observe, unobserve or fire other signals freely
//! - Only [`SignalController`] (and crate internals) can fire a signal

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::Error;
use crate::observability::metrics;
use crate::signal::combine::Upstream;

const POISONED: &str = "signal mutex poisoned";

/// Message used when a signal is aborted without a reason.
pub const ABORTED_WITHOUT_REASON: &str = "signal is aborted without reason";

/// Why a signal fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A deadline elapsed.
    Timeout { message: String },
    /// Fired on demand, optionally with a message.
    Aborted { message: Option<String> },
}

impl AbortReason {
    pub fn timeout(message: impl Into<String>) -> Self {
        AbortReason::Timeout {
            message: message.into(),
        }
    }

    pub fn aborted() -> Self {
        AbortReason::Aborted { message: None }
    }

    pub fn aborted_with(message: impl Into<String>) -> Self {
        AbortReason::Aborted {
            message: Some(message.into()),
        }
    }

    /// True if the reason traces back to a deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AbortReason::Timeout { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            AbortReason::Timeout { message } => Some(message),
            AbortReason::Aborted { message } => message.as_deref(),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            AbortReason::Timeout { .. } => "timeout",
            AbortReason::Aborted { .. } => "aborted",
        }
    }

    /// Classify the reason as a timeout or abort error.
    pub fn into_error(self) -> Error {
        match self {
            AbortReason::Timeout { message } => Error::Timeout { message },
            AbortReason::Aborted { message } => Error::Aborted {
                message: message.unwrap_or_else(|| ABORTED_WITHOUT_REASON.to_string()),
            },
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout { message } => write!(f, "timeout: {}", message),
            AbortReason::Aborted { message: Some(message) } => write!(f, "aborted: {}", message),
            AbortReason::Aborted { message: None } => f.write_str(ABORTED_WITHOUT_REASON),
        }
    }
}

/// Callback invoked once when a signal fires.
pub type Listener = Box<dyn FnOnce(&AbortReason) + Send>;

/// Identifies one listener registration on one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum State {
    Pending { listeners: Vec<(ListenerId, Listener)> },
    Fired(AbortReason),
}

pub(crate) struct Inner {
    state: Mutex<State>,
    next_id: AtomicU64,
    /// Set on combinator outputs; dropping it detaches from the inputs.
    upstream: Mutex<Option<Upstream>>,
}

impl Inner {
    fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
            next_id: AtomicU64::new(0),
            upstream: Mutex::new(None),
        }
    }

    pub(crate) fn fire(&self, reason: AbortReason) -> bool {
        let previous = {
            let mut state = self.state.lock().expect(POISONED);
            if matches!(*state, State::Fired(_)) {
                return false;
            }
            std::mem::replace(&mut *state, State::Fired(reason.clone()))
        };
        let State::Pending { listeners } = previous else {
            return false;
        };

        tracing::trace!(reason = %reason, listeners = listeners.len(), "Signal fired");
        metrics::record_signal_fired(reason.label());

        for (_, listener) in listeners {
            listener(&reason);
        }
        true
    }
}

/// Observer handle to a single-fire signal.
///
/// Cloning is cheap; all clones observe the same signal.
#[derive(Clone)]
pub struct Signal {
    inner: Arc<Inner>,
}

impl Signal {
    pub(crate) fn pending() -> Self {
        Self {
            inner: Arc::new(Inner::new(State::Pending {
                listeners: Vec::new(),
            })),
        }
    }

    pub(crate) fn fired_with(reason: AbortReason) -> Self {
        Self {
            inner: Arc::new(Inner::new(State::Fired(reason))),
        }
    }

    /// A signal that has already fired with `reason`.
    pub fn already_fired(reason: AbortReason) -> Self {
        Self::fired_with(reason)
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::pending()
    }

    pub(crate) fn fire(&self, reason: AbortReason) -> bool {
        self.inner.fire(reason)
    }

    pub fn is_fired(&self) -> bool {
        matches!(*self.inner.state.lock().expect(POISONED), State::Fired(_))
    }

    /// The reason the signal fired, if it has.
    pub fn reason(&self) -> Option<AbortReason> {
        match &*self.inner.state.lock().expect(POISONED) {
            State::Fired(reason) => Some(reason.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Attach a listener that runs once when the signal fires.
    ///
    /// Returns `None` without keeping the listener if the signal has already
    /// fired; check [`Signal::reason`] in that case.
    pub fn observe<F>(&self, listener: F) -> Option<ListenerId>
    where
        F: FnOnce(&AbortReason) + Send + 'static,
    {
        let mut state = self.inner.state.lock().expect(POISONED);
        match &mut *state {
            State::Fired(_) => None,
            State::Pending { listeners } => {
                let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
                listeners.push((id, Box::new(listener)));
                Some(id)
            }
        }
    }

    /// Detach a listener. Returns false if it already ran or was detached.
    pub fn unobserve(&self, id: ListenerId) -> bool {
        let mut state = self.inner.state.lock().expect(POISONED);
        match &mut *state {
            State::Fired(_) => false,
            State::Pending { listeners } => {
                match listeners.iter().position(|(candidate, _)| *candidate == id) {
                    Some(index) => {
                        drop(listeners.remove(index));
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Number of listeners currently attached.
    pub fn listener_count(&self) -> usize {
        match &*self.inner.state.lock().expect(POISONED) {
            State::Pending { listeners } => listeners.len(),
            State::Fired(_) => 0,
        }
    }

    /// Future that resolves with the reason once the signal fires.
    ///
    /// Dropping the future detaches its listener.
    pub fn fired(&self) -> Fired {
        let (tx, rx) = oneshot::channel();
        let registration = self.observe(move |reason| {
            let _ = tx.send(reason.clone());
        });
        Fired {
            signal: self.clone(),
            rx: registration.map(|_| rx),
            registration,
        }
    }

    /// True if both handles observe the same signal.
    pub fn ptr_eq(&self, other: &Signal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakSignal {
        WeakSignal {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn set_upstream(&self, upstream: Upstream) {
        *self.inner.upstream.lock().expect(POISONED) = Some(upstream);
    }

    /// Detach a combinator output from its inputs.
    ///
    /// No-op on signals that were not produced by the combinator.
    pub(crate) fn detach_inputs(&self) {
        let upstream = self.inner.upstream.lock().expect(POISONED).take();
        drop(upstream);
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("reason", &self.reason())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct WeakSignal {
    inner: Weak<Inner>,
}

impl WeakSignal {
    pub(crate) fn upgrade(&self) -> Option<Signal> {
        self.inner.upgrade().map(|inner| Signal { inner })
    }
}

/// Owner of a signal: the only public way to fire it.
#[derive(Debug)]
pub struct SignalController {
    signal: Signal,
}

impl SignalController {
    pub fn new() -> Self {
        Self {
            signal: Signal::pending(),
        }
    }

    /// Observer handle for the controlled signal.
    pub fn signal(&self) -> Signal {
        self.signal.clone()
    }

    /// Fire without a reason. Returns false if already fired.
    pub fn abort(&self) -> bool {
        self.signal.fire(AbortReason::aborted())
    }

    /// Fire with an explicit reason. Returns false if already fired.
    pub fn abort_with(&self, reason: AbortReason) -> bool {
        self.signal.fire(reason)
    }

    pub fn is_fired(&self) -> bool {
        self.signal.is_fired()
    }
}

impl Default for SignalController {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`Signal::fired`].
#[derive(Debug)]
pub struct Fired {
    signal: Signal,
    registration: Option<ListenerId>,
    rx: Option<oneshot::Receiver<AbortReason>>,
}

impl Future for Fired {
    type Output = AbortReason;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(rx) = this.rx.as_mut() {
            match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(reason)) => {
                    this.rx = None;
                    this.registration = None;
                    return Poll::Ready(reason);
                }
                Poll::Ready(Err(_)) => {
                    this.rx = None;
                    this.registration = None;
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        // Registered after the signal fired, or the listener was dropped.
        match this.signal.reason() {
            Some(reason) => Poll::Ready(reason),
            None => Poll::Pending,
        }
    }
}

impl Drop for Fired {
    fn drop(&mut self) {
        if let Some(id) = self.registration.take() {
            self.signal.unobserve(id);
        }
    }
}
