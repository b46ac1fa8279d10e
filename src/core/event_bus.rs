use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Type-safe publish/subscribe bus for system-level notifications.
///
/// Settings records are immutable once handed to the terrain core, so
/// "the configuration changed" is modeled as an explicit event on this
/// bus instead of mutation observed through shared state: the external
/// configuration layer publishes, the streamer subscribes and swaps its
/// settings on the next tick.
type BoxedHandler = Box<dyn Fn(&dyn Any) + Send + Sync>;

pub struct EventBus {
    handlers: Mutex<HashMap<TypeId, Vec<BoxedHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to every published event of type `T`.
    pub fn subscribe<T, F>(&self, handler: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<T>() {
                handler(event);
            }
        });
        self.handlers
            .lock()
            .unwrap()
            .entry(TypeId::of::<T>())
            .or_default()
            .push(boxed);
    }

    /// Deliver `event` synchronously to all subscribers of its type.
    pub fn publish<T>(&self, event: T)
    where
        T: Send + Sync + 'static,
    {
        let handlers = self.handlers.lock().unwrap();
        if let Some(subscribers) = handlers.get(&TypeId::of::<T>()) {
            for handler in subscribers {
                handler(&event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct TestEvent;

    #[derive(Debug)]
    struct DataEvent {
        data: String,
    }

    // Basic event publication and subscription.
    #[test]
    fn test_simple_event_subscription() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(false));
        let received_cb = Arc::clone(&received);
        bus.subscribe(move |_: &TestEvent| {
            *received_cb.lock().unwrap() = true;
        });
        bus.publish(TestEvent);
        assert!(*received.lock().unwrap());
    }

    // All subscribers of a type are called.
    #[test]
    fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        for _ in 0..3 {
            let count_cb = Arc::clone(&count);
            bus.subscribe(move |_: &TestEvent| {
                *count_cb.lock().unwrap() += 1;
            });
        }
        bus.publish(TestEvent);
        assert_eq!(*count.lock().unwrap(), 3);
    }

    // Event payloads reach the handler intact.
    #[test]
    fn test_event_data_passing() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(None));
        let received_cb = Arc::clone(&received);
        bus.subscribe(move |event: &DataEvent| {
            *received_cb.lock().unwrap() = Some(event.data.clone());
        });
        bus.publish(DataEvent {
            data: "reload".to_string(),
        });
        assert_eq!(*received.lock().unwrap(), Some("reload".to_string()));
    }

    // Publishing with no subscribers is a no-op, not a panic.
    #[test]
    fn test_no_subscribers_scenario() {
        let bus = EventBus::new();
        bus.publish(TestEvent);
    }

    // Subscribers only see their own event type.
    #[test]
    fn test_type_isolation() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let count_cb = Arc::clone(&count);
        bus.subscribe(move |_: &TestEvent| {
            *count_cb.lock().unwrap() += 1;
        });
        bus.publish(DataEvent {
            data: "other".to_string(),
        });
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
