//! Subscriber types for the reactive system.
//!
//! A [`Listener`] is a callback with a stable identity. Identity matters:
//! when one listener is subscribed to several cells, a mutation scope
//! notifies it once no matter how many of those cells changed.
//!
//! A [`Bus`] is the plain add/remove/fire set behind every root cell.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::debounce::DebounceTimer;
use crate::value::Value;

/// Unique identifier for a subscriber.
///
/// Each listener, computation and tracking session gets a unique ID when
/// created. This ID is used to deduplicate notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Notify = dyn Fn(Option<&Value>) + Send + Sync;

/// A callback invoked when a subscribed cell changes.
///
/// The payload is `Some(new value)` for an immediate notification and `None`
/// when the call is a coalesced flush at the end of a mutation scope.
#[derive(Clone)]
pub struct Listener {
    id: SubscriberId,
    notify: Arc<Notify>,
}

impl Listener {
    /// Create a new listener with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Arc::new(notify),
        }
    }

    /// Get the listener's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Invoke the callback.
    pub fn notify(&self, payload: Option<&Value>) {
        (self.notify)(payload);
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// The listener set shared by a root cell and all of its lenses.
#[derive(Default)]
pub(crate) struct Bus {
    listeners: Mutex<IndexMap<SubscriberId, Listener>>,
}

impl Bus {
    pub fn add(&self, listener: Listener) {
        self.listeners.lock().insert(listener.id(), listener);
    }

    pub fn remove(&self, id: SubscriberId) -> bool {
        self.listeners.lock().shift_remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Copy the current listeners out so they can run without the lock.
    pub fn snapshot(&self) -> SmallVec<[Listener; 4]> {
        self.listeners.lock().values().cloned().collect()
    }

    pub fn fire(&self, payload: Option<&Value>) {
        let listeners = self.snapshot();
        tracing::trace!(listeners = listeners.len(), "notifying subscribers");
        for listener in listeners {
            listener.notify(payload);
        }
    }
}

/// Handle returned by `subscribe`. Unsubscribing is explicit; dropping the
/// handle leaves the listener in place.
#[derive(Clone)]
pub struct Subscription {
    bus: Arc<Bus>,
    id: SubscriberId,
    timer: Option<Arc<DebounceTimer>>,
}

impl Subscription {
    pub(crate) fn new(bus: Arc<Bus>, id: SubscriberId, timer: Option<Arc<DebounceTimer>>) -> Self {
        Self { bus, id, timer }
    }

    /// ID of the listener actually installed (the debounced wrapper when
    /// debouncing is on).
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the listener and cancel any pending debounced call.
    pub fn unsubscribe(&self) {
        self.bus.remove(self.id);
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("debounced", &self.timer.is_some())
            .finish()
    }
}

/// A group of subscriptions removed together.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions(SmallVec<[Subscription; 4]>);

impl Subscriptions {
    pub fn unsubscribe(&self) {
        for subscription in &self.0 {
            subscription.unsubscribe();
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Subscription> for Subscriptions {
    fn from_iter<I: IntoIterator<Item = Subscription>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn listener_notify_calls_callback() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let listener = Listener::new(move |payload| {
            *seen_clone.lock() = payload.cloned();
        });

        listener.notify(Some(&Value::from(7)));
        assert_eq!(*seen.lock(), Some(Value::from(7)));
    }

    #[test]
    fn bus_deduplicates_by_listener_id() {
        let bus = Arc::new(Bus::default());
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let listener = Listener::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.add(listener.clone());
        bus.add(listener.clone());
        assert_eq!(bus.len(), 1);

        bus.fire(None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let subscription = Subscription::new(bus.clone(), listener.id(), None);
        subscription.unsubscribe();
        bus.fire(None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
