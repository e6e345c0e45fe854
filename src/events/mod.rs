//! Typed publish/subscribe channel between windows, controllers and hosts.
//!
//! Listeners run synchronously inside [`EventBus::emit`], in registration
//! order. A listener that wants async work spawns it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WindowCreated,
    WindowRendered,
    WindowClosed,
    StateUpdated,
    ControlAction,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::WindowCreated => "window:created",
            EventKind::WindowRendered => "window:rendered",
            EventKind::WindowClosed => "window:closed",
            EventKind::StateUpdated => "state:updated",
            EventKind::ControlAction => "control:action",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    WindowCreated {
        instance_id: String,
        definition_id: String,
    },
    WindowRendered {
        instance_id: String,
    },
    WindowClosed {
        instance_id: String,
    },
    StateUpdated {
        instance_id: String,
        key: String,
        value: Value,
    },
    ControlAction {
        instance_id: String,
        control_id: String,
        action_id: String,
        event: Option<Value>,
    },
}

impl WindowEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WindowEvent::WindowCreated { .. } => EventKind::WindowCreated,
            WindowEvent::WindowRendered { .. } => EventKind::WindowRendered,
            WindowEvent::WindowClosed { .. } => EventKind::WindowClosed,
            WindowEvent::StateUpdated { .. } => EventKind::StateUpdated,
            WindowEvent::ControlAction { .. } => EventKind::ControlAction,
        }
    }

    pub fn instance_id(&self) -> &str {
        match self {
            WindowEvent::WindowCreated { instance_id, .. }
            | WindowEvent::WindowRendered { instance_id }
            | WindowEvent::WindowClosed { instance_id }
            | WindowEvent::StateUpdated { instance_id, .. }
            | WindowEvent::ControlAction { instance_id, .. } => instance_id,
        }
    }
}

pub type ListenerId = u64;

type Callback = Arc<dyn Fn(&WindowEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    once: bool,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    listeners: RwLock<HashMap<EventKind, Vec<Listener>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|listener| listener.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }
}

/// Cloneable handle to a shared listener table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&WindowEvent) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(callback))
    }

    /// Like [`EventBus::on`], but the listener is dropped after its first call.
    pub fn once<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&WindowEvent) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(callback))
    }

    /// Removes a listener; returns whether it was still registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.remove(kind, id)
    }

    pub fn emit(&self, event: WindowEvent) {
        let kind = event.kind();
        let callbacks: Vec<Callback> = {
            let mut listeners = self
                .inner
                .listeners
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(entries) = listeners.get_mut(&kind) else {
                return;
            };
            let callbacks = entries
                .iter()
                .map(|listener| listener.callback.clone())
                .collect();
            entries.retain(|listener| !listener.once);
            if entries.is_empty() {
                listeners.remove(&kind);
            }
            callbacks
        };

        for callback in callbacks {
            callback(&event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listener_count(kind) > 0
    }

    fn register(&self, kind: EventKind, once: bool, callback: Callback) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Listener { id, once, callback });
        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }
}

/// Handle returned by [`EventBus::on`]; dropping it keeps the listener alive.
#[derive(Debug, Clone)]
pub struct Subscription {
    bus: Weak<BusInner>,
    kind: EventKind,
    id: ListenerId,
}

impl fmt::Debug for BusInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventBus")
    }
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn unsubscribe(&self) -> bool {
        self.bus
            .upgrade()
            .is_some_and(|bus| bus.remove(self.kind, self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn rendered(id: &str) -> WindowEvent {
        WindowEvent::WindowRendered {
            instance_id: id.into(),
        }
    }

    #[test]
    fn listeners_receive_events_of_their_kind() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.on(EventKind::StateUpdated, move |event| {
            if let WindowEvent::StateUpdated { key, value, .. } = event {
                sink.lock().unwrap().push((key.clone(), value.clone()));
            }
        });

        bus.emit(rendered("w1"));
        bus.emit(WindowEvent::StateUpdated {
            instance_id: "w1".into(),
            key: "count".into(),
            value: json!(5),
        });

        assert_eq!(*seen.lock().unwrap(), vec![("count".to_string(), json!(5))]);
    }

    #[test]
    fn once_fires_a_single_time() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        bus.once(EventKind::WindowRendered, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(rendered("w1"));
        bus.emit(rendered("w1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!bus.has_listeners(EventKind::WindowRendered));
    }

    #[test]
    fn unsubscribe_and_off_remove_listeners() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let first = bus.on(EventKind::WindowClosed, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let second = bus.on(EventKind::WindowClosed, |_| {});
        assert_eq!(bus.listener_count(EventKind::WindowClosed), 2);

        assert!(first.unsubscribe());
        assert!(!first.unsubscribe());
        assert!(bus.off(EventKind::WindowClosed, second.id()));

        bus.emit(WindowEvent::WindowClosed {
            instance_id: "w1".into(),
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count(EventKind::WindowClosed), 0);
    }

    #[test]
    fn listeners_may_subscribe_during_emit() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.once(EventKind::WindowCreated, move |_| {
            inner.on(EventKind::WindowClosed, |_| {});
        });
        bus.emit(WindowEvent::WindowCreated {
            instance_id: "w:1".into(),
            definition_id: "w".into(),
        });
        assert!(bus.has_listeners(EventKind::WindowClosed));
    }

    #[test]
    fn event_names_match_catalog() {
        assert_eq!(EventKind::ControlAction.to_string(), "control:action");
        assert_eq!(rendered("w1").instance_id(), "w1");
    }
}
