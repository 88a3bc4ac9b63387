//! Timeout notifications.
//!
//! The timed execution wrapper reports timeouts through [`TimeoutSink`] so
//! that interested parties (a UI toast, a log line) can react. Any
//! [`EventBus`] whose event type can be built from a [`TimeoutNotice`] is a
//! sink.

use std::time::Duration;

use crate::events::bus::{EventBus, EventMap};

/// Published when a timed operation hits its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutNotice {
    pub message: String,
    pub timeout: Duration,
}

/// Receiver of timeout notifications.
pub trait TimeoutSink: Send + Sync {
    fn timed_out(&self, notice: &TimeoutNotice);
}

impl<E> TimeoutSink for EventBus<E>
where
    E: EventMap + From<TimeoutNotice>,
{
    fn timed_out(&self, notice: &TimeoutNotice) {
        self.emit(E::from(notice.clone()));
    }
}

/// Events published by this crate itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    TimeoutError(TimeoutNotice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreEventKey {
    TimeoutError,
}

impl EventMap for CoreEvent {
    type Key = CoreEventKey;

    fn key(&self) -> CoreEventKey {
        match self {
            CoreEvent::TimeoutError(_) => CoreEventKey::TimeoutError,
        }
    }
}

impl From<TimeoutNotice> for CoreEvent {
    fn from(notice: TimeoutNotice) -> Self {
        CoreEvent::TimeoutError(notice)
    }
}
