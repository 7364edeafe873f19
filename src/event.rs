//! Event targets that streams can subscribe to.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::{Error, Result};

/// Callback invoked with each event payload
pub type Listener<E> = Arc<dyn Fn(E) + Send + Sync>;

/// Unique identifier for a listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Something that fires named events at registered listeners.
pub trait EventTarget: Send + Sync {
    /// The payload delivered with each event
    type Event: Send + 'static;

    /// Register `listener` for events named `event`.
    fn add_listener(&self, event: &str, listener: Listener<Self::Event>) -> Result<ListenerId>;

    /// Remove a registration. Returns `false` if it was not registered.
    fn remove_listener(&self, event: &str, id: ListenerId) -> bool;
}

/// An in-process event target.
///
/// Listeners run synchronously on the thread calling [`emit`](EventBus::emit).
pub struct EventBus<E> {
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Listener<E>)>>>,
    next_id: AtomicU64,
    max_listeners: Option<usize>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Create a bus with no listener limit
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            max_listeners: None,
        }
    }

    /// Create a bus that accepts at most `max` listeners per event
    pub fn with_max_listeners(max: usize) -> Self {
        Self {
            max_listeners: Some(max),
            ..Self::new()
        }
    }

    /// Fire `event` with `payload`. Returns the number of listeners called.
    pub fn emit(&self, event: &str, payload: E) -> usize {
        let listeners: Vec<Listener<E>> = self
            .listeners
            .lock()
            .get(event)
            .map(|registered| registered.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &listeners {
            listener(payload.clone());
        }
        listeners.len()
    }

    /// Number of listeners registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> EventTarget for EventBus<E> {
    type Event = E;

    fn add_listener(&self, event: &str, listener: Listener<E>) -> Result<ListenerId> {
        let mut listeners = self.listeners.lock();
        let registered = listeners.entry(event.to_string()).or_default();
        if let Some(max) = self.max_listeners {
            if registered.len() >= max {
                return Err(Error::listener(
                    event,
                    format!("listener limit of {} reached", max),
                ));
            }
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        registered.push((id, listener));
        Ok(id)
    }

    fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(registered) = listeners.get_mut(event) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(registered_id, _)| *registered_id != id);
        let removed = registered.len() != before;
        if registered.is_empty() {
            listeners.remove(event);
        }
        removed
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(event, registered)| (event.as_str(), registered.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("listeners", &counts)
            .field("max_listeners", &self.max_listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_registered_listeners() {
        let bus = EventBus::<usize>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        bus.add_listener(
            "tick",
            Arc::new(move |n: usize| {
                counter.fetch_add(n, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert_eq!(bus.emit("tick", 2), 1);
        assert_eq!(bus.emit("tock", 5), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_listener() {
        let bus = EventBus::<u8>::new();
        let id = bus.add_listener("x", Arc::new(|_: u8| {})).unwrap();
        assert_eq!(bus.listener_count("x"), 1);

        assert!(bus.remove_listener("x", id));
        assert!(!bus.remove_listener("x", id));
        assert_eq!(bus.listener_count("x"), 0);
    }

    #[test]
    fn test_listener_limit() {
        let bus = EventBus::<u8>::with_max_listeners(1);
        bus.add_listener("x", Arc::new(|_: u8| {})).unwrap();

        let err = bus.add_listener("x", Arc::new(|_: u8| {})).unwrap_err();
        assert!(matches!(err, Error::Listener { .. }));
        assert!(bus.add_listener("y", Arc::new(|_: u8| {})).is_ok());
    }
}
