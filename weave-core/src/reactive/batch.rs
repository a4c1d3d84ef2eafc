//! Mutation Scopes
//!
//! A mutation scope defers notifications raised by writes and fires each
//! affected listener exactly once when the outermost scope exits.
//!
//! # Implementation
//!
//! Each thread keeps a depth counter and an ordered set of pending
//! listeners keyed by [`SubscriberId`]. Nested scopes only bump the depth;
//! their listeners land in the same pending set and fire together at depth
//! zero.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use super::state::State;
use super::subscriber::{Bus, Listener, SubscriberId};
use crate::value::Value;

#[derive(Default)]
struct ScopeState {
    depth: usize,
    pending: IndexMap<SubscriberId, Listener>,
}

thread_local! {
    static SCOPE: RefCell<ScopeState> = RefCell::new(ScopeState::default());
}

/// Guard that leaves the scope when dropped, flushing at depth zero.
struct ScopeGuard;

impl ScopeGuard {
    fn enter() -> Self {
        SCOPE.with(|scope| scope.borrow_mut().depth += 1);
        Self
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let pending = SCOPE.with(|scope| {
            let mut scope = scope.borrow_mut();
            scope.depth -= 1;
            if scope.depth == 0 {
                std::mem::take(&mut scope.pending)
            } else {
                IndexMap::new()
            }
        });

        // A scope unwinding from a panic drops its pending set.
        if pending.is_empty() || std::thread::panicking() {
            return;
        }

        tracing::trace!(listeners = pending.len(), "flushing mutation scope");
        for listener in pending.into_values() {
            listener.notify(None);
        }
    }
}

/// Run `f` inside a mutation scope.
///
/// Listeners dirtied by writes inside `f` are called once, with no payload,
/// after the outermost scope returns.
pub fn run_in_mutation_scope<R>(f: impl FnOnce() -> R) -> R {
    let _guard = ScopeGuard::enter();
    f()
}

/// Whether the current thread is inside a mutation scope.
pub fn in_mutation_scope() -> bool {
    SCOPE.with(|scope| scope.borrow().depth > 0)
}

/// Deliver a change: defer inside a scope, fire immediately outside one.
pub(crate) fn dispatch(bus: &Arc<Bus>, value: &Value) {
    let deferred = SCOPE.with(|scope| {
        let mut scope = scope.borrow_mut();
        if scope.depth == 0 {
            return false;
        }
        for listener in bus.snapshot() {
            scope.pending.insert(listener.id(), listener);
        }
        true
    });

    if !deferred {
        bus.fire(Some(value));
    }
}

/// Read every cell of a named map.
pub fn get_values(states: &IndexMap<String, State>) -> IndexMap<String, Value> {
    states
        .iter()
        .map(|(key, state)| (key.clone(), state.get()))
        .collect()
}

/// Write each datum to the cell with the matching key, in one scope.
///
/// Keys that have no cell are ignored.
pub fn set_values(states: &IndexMap<String, State>, data: &IndexMap<String, Value>) {
    run_in_mutation_scope(|| {
        for (key, value) in data {
            if let Some(state) = states.get(key) {
                state.set(value.clone());
            }
        }
    });
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
