//! Typed, synchronous event dispatch.
//!
//! Listeners subscribe to a concrete event type and run in priority order
//! (higher first; equal priorities keep subscription order).  An event may
//! stop propagation, in which case the remaining listeners are skipped.
//!
//! ```rust,ignore
//! struct UserCreated { id: u64 }
//! impl Event for UserCreated {}
//!
//! dispatcher.listen(|e: &UserCreated| info!(id = e.id, "user created"));
//! dispatcher.dispatch(&UserCreated { id: 7 });
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

/// Marker trait for dispatchable events.
pub trait Event: Any + Send + Sync {
    /// Returns `true` once a listener has asked to stop propagation.
    ///
    /// Events that support stopping carry their own flag (usually an
    /// `AtomicBool`, since listeners only get `&self`).
    fn is_propagation_stopped(&self) -> bool {
        false
    }
}

type ListenerFn = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Listener {
    priority: i32,
    callback: ListenerFn,
}

/// Registry of event listeners keyed by event type.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<TypeId, Vec<Listener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` to events of type `E` with priority 0.
    pub fn listen<E, F>(&self, listener: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listen_with_priority(0, listener);
    }

    /// Subscribes `listener` to events of type `E`.
    pub fn listen_with_priority<E, F>(&self, priority: i32, listener: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let callback: ListenerFn = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                listener(event);
            }
        });

        let mut listeners = self.listeners.write();
        let list = listeners.entry(TypeId::of::<E>()).or_default();
        // Insert after every listener with the same or higher priority.
        let position = list
            .iter()
            .position(|l| l.priority < priority)
            .unwrap_or(list.len());
        list.insert(position, Listener { priority, callback });
        trace!(event = type_name::<E>(), priority, "Listener subscribed");
    }

    /// Delivers `event` to its listeners and returns how many ran.
    pub fn dispatch<E: Event>(&self, event: &E) -> usize {
        // Snapshot under the lock so listeners may subscribe while running.
        let callbacks: Vec<ListenerFn> = match self.listeners.read().get(&TypeId::of::<E>()) {
            Some(list) => list.iter().map(|l| Arc::clone(&l.callback)).collect(),
            None => return 0,
        };

        let mut invoked = 0;
        for callback in callbacks {
            if event.is_propagation_stopped() {
                trace!(event = type_name::<E>(), invoked, "Propagation stopped");
                break;
            }
            callback(event);
            invoked += 1;
        }
        invoked
    }

    /// Returns `true` if any listener is subscribed to `E`.
    pub fn has_listeners<E: Event>(&self) -> bool {
        self.listener_count::<E>() > 0
    }

    /// Number of listeners subscribed to `E`.
    pub fn listener_count<E: Event>(&self) -> usize {
        self.listeners
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        f.debug_struct("EventDispatcher")
            .field("event_types", &listeners.len())
            .field("listeners", &listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    use super::*;

    struct Ping;
    impl Event for Ping {}

    struct Stoppable {
        stopped: AtomicBool,
    }

    impl Event for Stoppable {
        fn is_propagation_stopped(&self) -> bool {
            self.stopped.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_dispatch_without_listeners() {
        let dispatcher = EventDispatcher::new();
        assert_eq!(dispatcher.dispatch(&Ping), 0);
        assert!(!dispatcher.has_listeners::<Ping>());
    }

    #[test]
    fn test_priority_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (priority, label) in [(0, "a"), (10, "b"), (0, "c"), (-5, "d")] {
            let order = Arc::clone(&order);
            dispatcher.listen_with_priority(priority, move |_: &Ping| order.lock().push(label));
        }

        assert_eq!(dispatcher.dispatch(&Ping), 4);
        assert_eq!(*order.lock(), vec!["b", "a", "c", "d"]);
        assert_eq!(dispatcher.listener_count::<Ping>(), 4);
    }

    #[test]
    fn test_stop_propagation() {
        let dispatcher = EventDispatcher::new();
        dispatcher.listen(|e: &Stoppable| e.stopped.store(true, Ordering::SeqCst));
        dispatcher.listen(|_: &Stoppable| panic!("must not run"));

        let event = Stoppable {
            stopped: AtomicBool::new(false),
        };
        assert_eq!(dispatcher.dispatch(&event), 1);
    }

    #[test]
    fn test_events_are_isolated_by_type() {
        let dispatcher = EventDispatcher::new();
        dispatcher.listen(|_: &Ping| {});
        assert!(dispatcher.has_listeners::<Ping>());
        assert!(!dispatcher.has_listeners::<Stoppable>());
    }
}
