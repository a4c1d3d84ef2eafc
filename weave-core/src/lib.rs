//! Weave Core
//!
//! This crate provides fine-grained reactive cells over dynamic values.
//! It implements:
//!
//! - State cells with path lenses that share their root's storage
//! - Mutation scopes that coalesce notifications
//! - Derived cells, synchronous or asynchronous, with stale-result suppression
//! - Async status records and a projection builder over them
//! - List chunking with stable chunk cells
//! - Kind-specific helpers for numbers, dates, text, objects and lists
//!
//! # Architecture
//!
//! - `value`: the dynamic [`Value`] type and its identity rules
//! - `graph`: the [`Store`] arena holding every cell node
//! - `reactive`: cells, tracking, scopes, computations, effects
//! - `helpers`: capability traits implemented for [`State`]
//!
//! # Example
//!
//! ```rust
//! use weave_core::{run_in_mutation_scope, Listener, State, Value};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let form = State::new(serde_json::json!({ "first": "Ada", "last": "King" }));
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counter = calls.clone();
//! let _sub = form.subscribe(&Listener::new(move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! run_in_mutation_scope(|| {
//!     form.set_path("first", "Grace");
//!     form.set_path("last", "Hopper");
//! });
//!
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! assert_eq!(form.get_path("last"), Value::from("Hopper"));
//! ```

pub mod compare;
pub mod error;
pub mod graph;
pub mod helpers;
pub mod reactive;
pub mod value;

pub use compare::Compare;
pub use error::{BoxError, Error, Result};
pub use graph::{NodeId, NodeKind, Store};
pub use helpers::{DateOps, DateUnit, ListOps, NumberOps, ObjectOps, TextOps};
pub use reactive::{
    get_values, run_in_mutation_scope, set_values, snapshot, subscribe_all, untracked,
    AsyncProjection, AsyncStatus, ComputeOptions, Computed, Debounce, Effect, Listener,
    SubscribeOptions, Subscription, State, StateOptions,
};
pub use value::{Value, ValueKind};
