//! Change notifications raised by the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A change to the set of stored devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A device record was written.
    DeviceAdded(String),
    /// A device record was removed.
    DeviceRemoved(String),
}

impl StoreEvent {
    /// The uid of the affected device.
    pub fn uid(&self) -> &str {
        match self {
            StoreEvent::DeviceAdded(uid) | StoreEvent::DeviceRemoved(uid) => uid,
        }
    }
}

/// Handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// Registry of synchronous observers.
///
/// Events are delivered in registration order on the emitting thread.
/// Observers registered after an event was emitted never see it.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Observer)>>,
}

impl Observers {
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(other, _)| *other != id);
        observers.len() != before
    }

    pub fn emit(&self, event: &StoreEvent) {
        // Observers run without the lock held, so they may (un)subscribe.
        let snapshot: Vec<Observer> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
