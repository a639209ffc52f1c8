//! Typed event bus for grid notifications

use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;
use tracing::trace;

/// Event bus a grid instance publishes its notifications on
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<std::any::TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Grid events
pub mod events {
    use super::Event;

    /// A window request resolved with rows
    #[derive(Debug, Clone)]
    pub struct WindowLoaded {
        pub start_row: usize,
        pub row_count: usize,
        pub total_length: usize,
        pub filtered: bool,
    }

    /// A window request resolved with the failure callback
    #[derive(Debug, Clone)]
    pub struct WindowFailed {
        pub start_row: usize,
        pub end_row: usize,
        pub error: String,
    }

    /// Column/filter state was persisted (`onsavestate`)
    #[derive(Debug, Clone)]
    pub struct StateSaved {
        pub node_id: String,
        pub state: serde_json::Value,
    }

    /// The list of saved views changed
    #[derive(Debug, Clone)]
    pub struct ViewsChanged {
        pub node_id: String,
        pub view_names: Vec<String>,
    }

    /// A row was marked selected by reconciliation with the current element
    #[derive(Debug, Clone)]
    pub struct RowSelected {
        pub row_index: usize,
    }

    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        WindowLoaded,
        WindowFailed,
        StateSaved,
        ViewsChanged,
        RowSelected
    );
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();
        handlers.entry(type_id).or_insert_with(Vec::new).push(handler);
    }

    /// Publish an event to the handlers of its type
    pub fn publish<E: Event>(&self, event: E) {
        let type_id = std::any::TypeId::of::<E>();
        let mut handlers = self.handlers.lock();

        if let Some(event_handlers) = handlers.get_mut(&type_id) {
            trace!(event = std::any::type_name::<E>(), handlers = event_handlers.len(), "Publishing event");
            for handler in event_handlers.iter_mut() {
                handler.handle(&event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.handlers.lock().len())
            .finish()
    }
}

struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::events::{WindowFailed, WindowLoaded};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_reaches_only_matching_type() {
        let bus = EventBus::new();
        let loaded = Arc::new(AtomicUsize::new(0));

        let counter = loaded.clone();
        bus.subscribe::<WindowLoaded>(handler_from_fn(move |event| {
            if let Some(e) = event.as_any().downcast_ref::<WindowLoaded>() {
                counter.fetch_add(e.row_count, Ordering::SeqCst);
            }
        }));

        bus.publish(WindowLoaded { start_row: 0, row_count: 3, total_length: 3, filtered: false });
        bus.publish(WindowFailed { start_row: 0, end_row: 100, error: "boom".into() });

        assert_eq!(loaded.load(Ordering::SeqCst), 3);
    }
}
