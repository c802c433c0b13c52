use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use pitwatch_shared::{Device, PushMessage};
use tracing::warn;

use super::connection::ConnectionState;
use crate::error::TelemetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub previous: ConnectionState,
    pub current: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationEvent {
    pub success: bool,
    pub attempts: u32,
    pub error: Option<TelemetryError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub device_id: String,
    pub message: PushMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub devices: Vec<Device>,
}

/// Listener set for one event kind.
///
/// Emission snapshots the current listeners first, so a listener may register
/// or remove listeners while being called. A panicking listener is logged and
/// skipped; the remaining listeners still run.
pub struct Listeners<E> {
    name: &'static str,
    next_id: Cell<u64>,
    entries: RefCell<Vec<(ListenerId, Rc<dyn Fn(&E)>)>>,
}

impl<E> Listeners<E> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get().wrapping_add(1));
        self.entries.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Returns whether a listener was removed.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<_> = self
            .entries
            .borrow()
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(event = self.name, listener = id.0, "listener panicked; continuing");
            }
        }
    }
}

/// Typed event surface of [`super::TelemetryClient`].
pub struct EventHub {
    pub connection: Listeners<ConnectionEvent>,
    pub authentication: Listeners<AuthenticationEvent>,
    pub telemetry: Listeners<TelemetryEvent>,
    pub device: Listeners<DeviceEvent>,
    pub error: Listeners<TelemetryError>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self {
            connection: Listeners::new("connection"),
            authentication: Listeners::new("authentication"),
            telemetry: Listeners::new("telemetry"),
            device: Listeners::new("device"),
            error: Listeners::new("error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panicking_listener_does_not_block_others() {
        let listeners: Listeners<u32> = Listeners::new("test");
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = seen.clone();
        listeners.add(move |v| first.borrow_mut().push(("first", *v)));
        listeners.add(|_| panic!("listener failure"));
        let last = seen.clone();
        listeners.add(move |v| last.borrow_mut().push(("last", *v)));

        listeners.emit(&7);
        listeners.emit(&8);

        assert_eq!(
            *seen.borrow(),
            vec![("first", 7), ("last", 7), ("first", 8), ("last", 8)]
        );
    }

    #[test]
    fn removed_listeners_stop_receiving() {
        let listeners: Listeners<u32> = Listeners::new("test");
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = listeners.add(move |_| c.set(c.get() + 1));

        listeners.emit(&1);
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.emit(&2);

        assert_eq!(count.get(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn listener_may_register_during_emit() {
        let listeners: Rc<Listeners<u32>> = Rc::new(Listeners::new("test"));
        let inner = Rc::downgrade(&listeners);
        listeners.add(move |_| {
            if let Some(l) = inner.upgrade() {
                l.add(|_| {});
            }
        });
        listeners.emit(&1);
        assert_eq!(listeners.len(), 2);
    }
}
