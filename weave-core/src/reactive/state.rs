//! State Cells
//!
//! A [`State`] is the fundamental reactive primitive. It is a cheap handle
//! to a node of a [`Store`]: either a root that owns its value, or a lens
//! that views one key of a parent cell.
//!
//! # How Cells Work
//!
//! 1. Reading a cell with [`State::get`] inside a tracking session records
//!    the cell as a dependency of that session.
//!
//! 2. Writing a cell compares the new value with the current one using the
//!    cell's comparator. Equal writes are dropped without notifying anyone.
//!
//! 3. A changed write is stored (copy-on-write through the lens chain) and
//!    then delivered to every listener of the root, immediately or at the
//!    end of the enclosing mutation scope.
//!
//! # Thread Safety
//!
//! Handles are `Send + Sync`. No lock is held while comparators or
//! listeners run.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use super::batch::{self, run_in_mutation_scope};
use super::context;
use super::debounce::{debounced, SubscribeOptions};
use super::subscriber::{Listener, Subscription, Subscriptions};
use crate::compare::Compare;
use crate::error::Result;
use crate::graph::{NodeId, NodeKind, Store, StoreInner};
use crate::value::{Value, ValueKind};

/// A reactive cell.
///
/// # Example
///
/// ```rust
/// use weave_core::{State, Value};
///
/// let user = State::new(serde_json::json!({ "name": "Ada", "age": 36 }));
/// let age = user.prop("age");
///
/// age.set(37);
/// assert_eq!(user.get_path("age"), Value::from(37));
/// ```
#[derive(Clone)]
pub struct State {
    store: Store,
    id: NodeId,
}

impl State {
    /// Create a root cell in the global store.
    pub fn new(value: impl Into<Value>) -> Self {
        Store::global().state(value)
    }

    pub(crate) fn from_parts(store: Store, id: NodeId) -> Self {
        Self { store, id }
    }

    /// Get the cell's node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Whether this cell is a root or a lens.
    pub fn node_kind(&self) -> NodeKind {
        self.store.kind(self.id).unwrap_or(NodeKind::Root)
    }

    /// Kind of the current value, read without tracking.
    pub fn kind(&self) -> ValueKind {
        self.get_untracked().kind()
    }

    /// The root cell this cell reads from.
    pub fn root(&self) -> State {
        Self::from_parts(self.store.clone(), self.store.root_of(self.id))
    }

    /// Get the current value.
    ///
    /// Inside a tracking session this also records the cell as a
    /// dependency. A lazy computation targeting this cell is started by
    /// its first read.
    pub fn get(&self) -> Value {
        context::record(self);
        self.activate_on_read();
        self.store.read(self.id)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> Value {
        self.store.read(self.id)
    }

    /// Set a new value and notify subscribers.
    ///
    /// Nothing happens when the comparator reports the value unchanged.
    pub fn set(&self, value: impl Into<Value>) -> &Self {
        let value = value.into();
        let Some((current, compare, bus)) = self.store.write_context(self.id) else {
            return self;
        };
        if compare(&current, &value) {
            return self;
        }

        self.store.write(self.id, value.clone());
        tracing::trace!(cell = %self.id, kind = %value.kind(), "cell updated");
        batch::dispatch(&bus, &value);
        self
    }

    /// Get the lens cell for a dotted path such as `"address.street"`.
    ///
    /// The same path always yields the same cell.
    pub fn prop(&self, path: &str) -> State {
        let id = path
            .split('.')
            .fold(self.id, |parent, key| self.store.lens(parent, key));
        Self::from_parts(self.store.clone(), id)
    }

    /// Read a dotted path through its lens cell.
    pub fn get_path(&self, path: &str) -> Value {
        self.prop(path).get()
    }

    /// Write a dotted path through its lens cell.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> &Self {
        self.prop(path).set(value);
        self
    }

    /// Call `f` with the cell and its current value, then return the cell.
    pub fn tap(&self, f: impl FnOnce(&State, &Value)) -> &Self {
        f(self, &self.get_untracked());
        self
    }

    /// Replace the value with `f(current)`.
    pub fn mutate(&self, f: impl FnOnce(Value) -> Value) -> &Self {
        let next = f(self.get_untracked());
        self.set(next)
    }

    /// Edit a working copy of the value in place and write it back.
    ///
    /// Containers are copied on first write (`Arc::make_mut`), so an edit
    /// produces a new identity and a closure that changes nothing leaves
    /// the cell untouched.
    pub fn mutate_cloned<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut working = self.get_untracked();
        let result = f(&mut working);
        self.set(working);
        result
    }

    /// Fallible form of [`State::mutate`]. On error the cell is unchanged.
    pub fn try_mutate(&self, f: impl FnOnce(Value) -> Result<Value>) -> Result<&Self> {
        let next = f(self.get_untracked())?;
        Ok(self.set(next))
    }

    /// Run `f` inside one mutation scope.
    pub fn batch<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        run_in_mutation_scope(|| f(self))
    }

    /// Register `listener` on the cell's subscriber set.
    ///
    /// Every cell of one tree shares the root's set.
    pub fn subscribe(&self, listener: &Listener) -> Subscription {
        self.subscribe_with(listener, SubscribeOptions::default())
    }

    pub fn subscribe_with(&self, listener: &Listener, options: SubscribeOptions) -> Subscription {
        let (installed, timer) = debounced(listener, options.debounce);
        let bus = self.store.bus(self.id).unwrap_or_default();
        let id = installed.id();
        bus.add(installed);
        Subscription::new(bus, id, timer)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.unsubscribe();
    }

    /// Get the number of listeners on the shared subscriber set.
    pub fn subscriber_count(&self) -> usize {
        self.store.bus(self.id).map_or(0, |bus| bus.len())
    }

    pub fn downgrade(&self) -> WeakState {
        WeakState {
            store: self.store.downgrade(),
            id: self.id,
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.store.ptr_eq(&other.store)
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Subscribe one listener to several cells.
///
/// With debouncing on, the cells share a single timer, so a burst of
/// changes across all of them still produces one call.
pub fn subscribe_all(
    states: &[State],
    listener: &Listener,
    options: SubscribeOptions,
) -> Subscriptions {
    let (installed, timer) = debounced(listener, options.debounce);
    states
        .iter()
        .map(|state| {
            let bus = state.store.bus(state.id).unwrap_or_default();
            bus.add(installed.clone());
            Subscription::new(bus, installed.id(), timer.clone())
        })
        .collect()
}

/// A handle that does not keep the store alive.
#[derive(Clone)]
pub struct WeakState {
    store: Weak<StoreInner>,
    id: NodeId,
}

impl WeakState {
    pub fn upgrade(&self) -> Option<State> {
        self.store
            .upgrade()
            .map(|inner| State::from_parts(Store::from_inner(inner), self.id))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl fmt::Debug for WeakState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakState").field("id", &self.id).finish()
    }
}

/// Options for creating a root cell.
#[derive(Clone, Default)]
pub struct StateOptions {
    compare: Option<Compare>,
}

impl StateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `compare` instead of reference identity to detect no-op writes.
    pub fn compare(mut self, compare: Compare) -> Self {
        self.compare = Some(compare);
        self
    }

    pub fn compare_with<F>(self, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.compare(Arc::new(compare))
    }

    pub(crate) fn into_compare(self) -> Option<Compare> {
        self.compare
    }
}

impl fmt::Debug for StateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateOptions")
            .field("custom_compare", &self.compare.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
