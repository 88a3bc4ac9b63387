//! Typed publish/subscribe bus.
//!
//! # Responsibilities
//! - Keep an ordered handler list per event key, plus a wildcard list
//! - Dispatch an event to its key's handlers, then to wildcard handlers
//!
//! # Design Decisions
//! - Events are an enum implementing [`EventMap`]; the key is derived from the
//!   event, so a key can never be emitted with another key's payload
//! - Handlers are compared by identity, so the same handler can be removed
//! - Emission works on snapshots of both the keyed and the wildcard list,
//!   taken together under one lock before any handler runs: handlers may
//!   subscribe or unsubscribe while an emission is in flight without changing
//!   who receives it
//! - A panicking handler is not caught; the rest of that emission is skipped

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::observability::metrics;

const POISONED: &str = "event bus mutex poisoned";

/// Mapping from event keys to payloads, implemented by an event enum.
pub trait EventMap: Send + Sync + 'static {
    type Key: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Key this event is dispatched under.
    fn key(&self) -> Self::Key;
}

/// Handler for one event key.
pub struct Handler<E> {
    callback: Arc<dyn Fn(&E) + Send + Sync>,
}

impl<E> Handler<E> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// True if both values refer to the same registered callback.
    pub fn same(&self, other: &Handler<E>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }

    fn call(&self, event: &E) {
        (self.callback)(event)
    }
}

impl<E> Clone for Handler<E> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
        }
    }
}

impl<E> fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("callback", &Arc::as_ptr(&self.callback))
            .finish()
    }
}

/// Handler invoked for every emitted event, with its key.
pub struct WildcardHandler<E: EventMap> {
    callback: Arc<dyn Fn(E::Key, &E) + Send + Sync>,
}

impl<E: EventMap> WildcardHandler<E> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(E::Key, &E) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn same(&self, other: &WildcardHandler<E>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(&other.callback))
    }

    fn call(&self, key: E::Key, event: &E) {
        (self.callback)(key, event)
    }
}

impl<E: EventMap> Clone for WildcardHandler<E> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
        }
    }
}

impl<E: EventMap> fmt::Debug for WildcardHandler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WildcardHandler")
            .field("callback", &Arc::as_ptr(&self.callback))
            .finish()
    }
}

struct Registry<E: EventMap> {
    handlers: HashMap<E::Key, Vec<Handler<E>>>,
    wildcard: Option<Vec<WildcardHandler<E>>>,
}

/// Remove the first entry matching `same`, if any.
fn remove_first<T>(list: &mut Vec<T>, same: impl Fn(&T) -> bool) {
    if let Some(index) = list.iter().position(same) {
        list.remove(index);
    }
}

/// Publish/subscribe registry for one event type.
pub struct EventBus<E: EventMap> {
    all: Mutex<Registry<E>>,
}

impl<E: EventMap> EventBus<E> {
    pub fn new() -> Self {
        Self {
            all: Mutex::new(Registry {
                handlers: HashMap::new(),
                wildcard: None,
            }),
        }
    }

    /// Append `handler` to the list for `key`.
    ///
    /// Registering the same handler twice creates two entries.
    pub fn on(&self, key: E::Key, handler: Handler<E>) {
        let mut all = self.all.lock().expect(POISONED);
        all.handlers.entry(key).or_default().push(handler);
    }

    /// Wrap `callback` in a [`Handler`], register it and return it for [`EventBus::off`].
    pub fn subscribe<F>(&self, key: E::Key, callback: F) -> Handler<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handler = Handler::new(callback);
        self.on(key, handler.clone());
        handler
    }

    /// Register a handler invoked for every key.
    pub fn on_any(&self, handler: WildcardHandler<E>) {
        let mut all = self.all.lock().expect(POISONED);
        all.wildcard.get_or_insert_with(Vec::new).push(handler);
    }

    pub fn subscribe_any<F>(&self, callback: F) -> WildcardHandler<E>
    where
        F: Fn(E::Key, &E) + Send + Sync + 'static,
    {
        let handler = WildcardHandler::new(callback);
        self.on_any(handler.clone());
        handler
    }

    /// Remove the first registration of `handler`, or every handler when
    /// `handler` is `None`.
    ///
    /// Clearing keeps the key, mapped to an empty list. Unknown keys are
    /// left untouched.
    pub fn off(&self, key: E::Key, handler: Option<&Handler<E>>) {
        let mut all = self.all.lock().expect(POISONED);
        let Some(handlers) = all.handlers.get_mut(&key) else {
            return;
        };
        match handler {
            Some(handler) => remove_first(handlers, |candidate| candidate.same(handler)),
            None => handlers.clear(),
        }
    }

    /// Wildcard counterpart of [`EventBus::off`].
    pub fn off_any(&self, handler: Option<&WildcardHandler<E>>) {
        let mut all = self.all.lock().expect(POISONED);
        let Some(handlers) = all.wildcard.as_mut() else {
            return;
        };
        match handler {
            Some(handler) => remove_first(handlers, |candidate| candidate.same(handler)),
            None => handlers.clear(),
        }
    }

    /// Invoke the handlers for the event's key in registration order, then
    /// the wildcard handlers.
    ///
    /// Both lists are snapshotted together before any handler runs.
    pub fn emit(&self, event: E) {
        let key = event.key();
        tracing::trace!(key = ?key, "Emitting event");
        metrics::record_emit();

        let (handlers, wildcard) = {
            let all = self.all.lock().expect(POISONED);
            (all.handlers.get(&key).cloned(), all.wildcard.clone())
        };

        for handler in handlers.iter().flatten() {
            handler.call(&event);
        }
        for handler in wildcard.iter().flatten() {
            handler.call(key, &event);
        }
    }

    /// Handlers registered for `key`; `None` if the key was never registered.
    pub fn handler_count(&self, key: E::Key) -> Option<usize> {
        let all = self.all.lock().expect(POISONED);
        all.handlers.get(&key).map(Vec::len)
    }

    pub fn wildcard_count(&self) -> usize {
        let all = self.all.lock().expect(POISONED);
        all.wildcard.as_ref().map_or(0, Vec::len)
    }

    /// Keys present in the registry, including cleared ones.
    pub fn keys(&self) -> Vec<E::Key> {
        let all = self.all.lock().expect(POISONED);
        all.handlers.keys().copied().collect()
    }

    /// Drop every registration, keyed and wildcard.
    pub fn clear(&self) {
        let mut all = self.all.lock().expect(POISONED);
        all.handlers.clear();
        all.wildcard = None;
    }
}

impl<E: EventMap> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventMap> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all = self.all.lock().expect(POISONED);
        let counts: HashMap<_, _> = all
            .handlers
            .iter()
            .map(|(key, handlers)| (*key, handlers.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("handlers", &counts)
            .field("wildcard", &all.wildcard.as_ref().map_or(0, Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        K(i32),
        Other(String),
        Ping,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKey {
        K,
        Other,
        Ping,
    }

    impl EventMap for TestEvent {
        type Key = TestKey;

        fn key(&self) -> TestKey {
            match self {
                TestEvent::K(_) => TestKey::K,
                TestEvent::Other(_) => TestKey::Other,
                TestEvent::Ping => TestKey::Ping,
            }
        }
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> Handler<TestEvent> {
        let log = log.clone();
        Handler::new(move |event| log.lock().unwrap().push(format!("{name}({event:?})")))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_emit_order() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.on(TestKey::K, recorder(&log, "A"));
        bus.on(TestKey::K, recorder(&log, "B"));
        let wildcard_log = log.clone();
        bus.subscribe_any(move |key, event| {
            wildcard_log.lock().unwrap().push(format!("W({key:?}, {event:?})"));
        });

        bus.emit(TestEvent::K(5));

        assert_eq!(entries(&log), vec!["A(K(5))", "B(K(5))", "W(K, K(5))"]);
    }

    #[test]
    fn test_same_handler_registered_twice() {
        let bus = EventBus::new();
        let log = Log::default();
        let a = recorder(&log, "A");
        bus.on(TestKey::Ping, a.clone());
        bus.on(TestKey::Ping, a.clone());

        bus.emit(TestEvent::Ping);
        assert_eq!(entries(&log).len(), 2);

        bus.off(TestKey::Ping, Some(&a));
        assert_eq!(bus.handler_count(TestKey::Ping), Some(1));
        bus.emit(TestEvent::Ping);
        assert_eq!(entries(&log).len(), 3);
    }

    #[test]
    fn test_off_removes_first_occurrence_only() {
        let bus = EventBus::new();
        let log = Log::default();
        let a = recorder(&log, "A");
        let b = recorder(&log, "B");
        bus.on(TestKey::K, a.clone());
        bus.on(TestKey::K, b);
        bus.on(TestKey::K, a.clone());

        bus.off(TestKey::K, Some(&a));
        bus.emit(TestEvent::K(1));
        assert_eq!(entries(&log), vec!["B(K(1))", "A(K(1))"]);
    }

    #[test]
    fn test_off_unregistered_handler_is_noop() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.on(TestKey::K, recorder(&log, "A"));

        bus.off(TestKey::K, Some(&recorder(&log, "A")));
        assert_eq!(bus.handler_count(TestKey::K), Some(1));
    }

    #[test]
    fn test_off_without_handler_clears_but_keeps_key() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.on(TestKey::K, recorder(&log, "A"));
        bus.on(TestKey::K, recorder(&log, "B"));

        bus.off(TestKey::K, None);
        assert_eq!(bus.handler_count(TestKey::K), Some(0));
        assert_eq!(bus.keys(), vec![TestKey::K]);

        bus.emit(TestEvent::K(1));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_off_unknown_key_is_noop() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.on(TestKey::K, recorder(&log, "A"));

        bus.off(TestKey::Other, None);
        bus.off(TestKey::Other, Some(&recorder(&log, "A")));

        assert_eq!(bus.handler_count(TestKey::Other), None);
        assert_eq!(bus.keys(), vec![TestKey::K]);
        assert_eq!(bus.handler_count(TestKey::K), Some(1));
    }

    #[test]
    fn test_off_any() {
        let bus = EventBus::new();
        let log = Log::default();
        let wildcard_log = log.clone();
        let wildcard = bus.subscribe_any(move |key, _| {
            wildcard_log.lock().unwrap().push(format!("W({key:?})"));
        });

        bus.off_any(Some(&wildcard));
        assert_eq!(bus.wildcard_count(), 0);
        bus.emit(TestEvent::Other("x".into()));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_unsubscribe_during_emit_keeps_snapshot() {
        let bus = Arc::new(EventBus::new());
        let log = Log::default();
        let b = recorder(&log, "B");

        let bus_in_handler = bus.clone();
        let b_in_handler = b.clone();
        let a_log = log.clone();
        let a = Handler::new(move |event: &TestEvent| {
            a_log.lock().unwrap().push(format!("A({event:?})"));
            bus_in_handler.off(TestKey::K, Some(&b_in_handler));
        });
        bus.on(TestKey::K, a);
        bus.on(TestKey::K, b);

        bus.emit(TestEvent::K(1));
        assert_eq!(entries(&log), vec!["A(K(1))", "B(K(1))"]);

        bus.emit(TestEvent::K(2));
        assert_eq!(entries(&log), vec!["A(K(1))", "B(K(1))", "A(K(2))"]);
    }

    #[test]
    fn test_unsubscribe_wildcard_during_emit_keeps_snapshot() {
        let bus: Arc<EventBus<TestEvent>> = Arc::new(EventBus::new());
        let log = Log::default();
        let wildcard_log = log.clone();
        let wildcard = WildcardHandler::<TestEvent>::new(move |_, _| {
            wildcard_log.lock().unwrap().push("W".into());
        });

        let bus_in_handler = bus.clone();
        let w_in_handler = wildcard.clone();
        let a_log = log.clone();
        bus.subscribe(TestKey::K, move |_| {
            a_log.lock().unwrap().push("A".into());
            bus_in_handler.off_any(Some(&w_in_handler));
        });
        bus.on_any(wildcard);

        bus.emit(TestEvent::K(1));
        assert_eq!(entries(&log), vec!["A", "W"]);

        bus.emit(TestEvent::K(2));
        assert_eq!(entries(&log), vec!["A", "W", "A"]);
    }

    #[test]
    fn test_wildcard_added_during_emit_waits_for_next_emit() {
        let bus: Arc<EventBus<TestEvent>> = Arc::new(EventBus::new());
        let log = Log::default();
        let bus_in_handler = bus.clone();
        let wildcard_log = log.clone();
        bus.subscribe(TestKey::Ping, move |_| {
            let wildcard_log = wildcard_log.clone();
            bus_in_handler.subscribe_any(move |key, _| {
                wildcard_log.lock().unwrap().push(format!("W({key:?})"));
            });
        });

        bus.emit(TestEvent::Ping);
        assert!(entries(&log).is_empty());
        assert_eq!(bus.wildcard_count(), 1);
    }

    #[test]
    fn test_self_removal_during_emit() {
        let bus = Arc::new(EventBus::new());
        let log = Log::default();
        let bus_in_handler = bus.clone();
        let handler_log = log.clone();
        let slot: Arc<Mutex<Option<Handler<TestEvent>>>> = Arc::default();
        let slot_in_handler = slot.clone();

        let once = bus.subscribe(TestKey::Ping, move |_| {
            handler_log.lock().unwrap().push("once".into());
            if let Some(me) = slot_in_handler.lock().unwrap().as_ref() {
                bus_in_handler.off(TestKey::Ping, Some(me));
            }
        });
        bus.on(TestKey::Ping, recorder(&log, "after"));
        *slot.lock().unwrap() = Some(once);

        bus.emit(TestEvent::Ping);
        bus.emit(TestEvent::Ping);
        assert_eq!(entries(&log), vec!["once", "after(Ping)", "after(Ping)"]);
    }

    #[test]
    fn test_subscribe_during_emit_waits_for_next_emit() {
        let bus = Arc::new(EventBus::new());
        let log = Log::default();
        let bus_in_handler = bus.clone();
        let late = recorder(&log, "late");
        bus.subscribe(TestKey::K, move |_| {
            bus_in_handler.on(TestKey::K, late.clone());
        });

        bus.emit(TestEvent::K(1));
        assert!(entries(&log).is_empty());

        bus.emit(TestEvent::K(2));
        assert_eq!(entries(&log), vec!["late(K(2))"]);
    }

    #[test]
    fn test_panicking_handler_stops_emission() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.on(TestKey::K, recorder(&log, "A"));
        bus.subscribe(TestKey::K, |_| panic!("handler failed"));
        bus.on(TestKey::K, recorder(&log, "C"));
        let wildcard_log = log.clone();
        bus.subscribe_any(move |_, _| wildcard_log.lock().unwrap().push("W".into()));

        let result = catch_unwind(AssertUnwindSafe(|| bus.emit(TestEvent::K(1))));

        assert!(result.is_err());
        assert_eq!(entries(&log), vec!["A(K(1))"]);

        // The bus stays usable.
        bus.emit(TestEvent::Other("x".into()));
        assert_eq!(entries(&log), vec!["A(K(1))", "W"]);
    }

    #[test]
    fn test_keys_are_independent() {
        let bus = EventBus::new();
        let log = Log::default();
        bus.on(TestKey::K, recorder(&log, "A"));
        bus.on(TestKey::Other, recorder(&log, "B"));

        bus.emit(TestEvent::Other("hi".into()));
        assert_eq!(entries(&log), vec![r#"B(Other("hi"))"#]);
    }
}
