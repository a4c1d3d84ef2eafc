//! Reactive Primitives
//!
//! This module implements the reactive layer on top of the cell graph:
//! state cells, dependency tracking, mutation scopes, computations, async
//! cells, chunking and effects.
//!
//! # Concepts
//!
//! ## State
//!
//! A [`State`] is a cell. Reading it inside a tracking session records it as
//! a dependency; writing it notifies every listener of its tree unless the
//! comparator says nothing changed.
//!
//! ## Mutation Scopes
//!
//! [`run_in_mutation_scope`] defers notifications until the outermost scope
//! exits and delivers each listener once, however many cells it watches
//! changed.
//!
//! ## Computations
//!
//! [`State::compute`] keeps a cell derived from source cells. Derivations may
//! return futures; results that arrive after a newer run started are
//! dropped.
//!
//! ## Effects
//!
//! An [`Effect`] re-runs a body whenever the cells it read change, the way a
//! view binding would.
//!
//! # Implementation Notes
//!
//! Dependency tracking and mutation scopes are thread-local stacks. Both are
//! strictly nested: a session or scope always restores the state it found.
//! Anything asynchronous (futures, lazy activation, debounce timers) runs
//! on the ambient tokio runtime through [`Runtime`].

mod async_state;
mod batch;
mod chunk;
mod compute;
mod context;
mod debounce;
mod effect;
mod runtime;
mod snapshot;
mod state;
mod subscriber;

pub use async_state::{AsyncProjection, AsyncStatus};
pub use batch::{get_values, in_mutation_scope, run_in_mutation_scope, set_values};
pub use compute::{ComputeOptions, Computed};
pub use context::{begin_tracking, is_tracking, track, untracked, Dependencies, TrackingSession};
pub use debounce::{Debounce, SubscribeOptions, DEFAULT_DEBOUNCE};
pub use effect::Effect;
pub use runtime::Runtime;
pub use snapshot::{snapshot, Snapshot};
pub use state::{subscribe_all, State, StateOptions, WeakState};
pub use subscriber::{Listener, SubscriberId, Subscription, Subscriptions};

pub(crate) use chunk::Chunking;
pub(crate) use compute::Computation;
pub(crate) use subscriber::Bus;
