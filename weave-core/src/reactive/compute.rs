//! Computed Cells
//!
//! [`State::compute`] derives a cell's value from a list of source cells.
//!
//! # How Computations Work
//!
//! 1. The derivation is subscribed to every source cell (debounced if
//!    asked) and runs once eagerly, unless the computation is lazy.
//!
//! 2. Each run takes a fresh generation token. A derivation may return a
//!    value, which is written at once, or a future, which is awaited on the
//!    host runtime and committed only if its token is still the latest.
//!
//! 3. Errors from the derivation or the future go to `on_error` and never
//!    reach the writer that triggered the run.
//!
//! # Lazy Computations
//!
//! A lazy computation does nothing until its target is first read. The
//! first read schedules activation on the next tick; further reads before
//! then are no-ops.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;

use super::async_state::AsyncStatus;
use super::context::untracked;
use super::debounce::{Debounce, SubscribeOptions};
use super::runtime::Runtime;
use super::state::{subscribe_all, State, WeakState};
use super::subscriber::{Listener, SubscriberId, Subscriptions};
use crate::value::Value;

/// Output of a derivation.
pub enum Computed {
    /// A value available now.
    Ready(Value),

    /// A value that settles later. `Err` carries the rejection.
    Pending(BoxFuture<'static, Result<Value, Value>>),
}

impl Computed {
    pub fn ready(value: impl Into<Value>) -> Self {
        Computed::Ready(value.into())
    }

    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Computed::Pending(future.boxed())
    }
}

impl From<Value> for Computed {
    fn from(value: Value) -> Self {
        Computed::Ready(value)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computed::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Computed::Pending(_) => f.write_str("Pending"),
        }
    }
}

type ErrorHandler = Arc<dyn Fn(&Value) + Send + Sync>;

type Derive = dyn Fn(&[Value]) -> Result<Computed, Value> + Send + Sync;

/// Options for [`State::compute`].
#[derive(Clone, Default)]
pub struct ComputeOptions {
    on_error: Option<ErrorHandler>,
    lazy: bool,
    debounce: Debounce,
}

impl ComputeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive errors from the derivation or its future.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Defer the first run until the target is read.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Debounce re-runs triggered by source changes.
    pub fn debounce(mut self, debounce: impl Into<Debounce>) -> Self {
        self.debounce = debounce.into();
        self
    }
}

impl fmt::Debug for ComputeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeOptions")
            .field("on_error", &self.on_error.is_some())
            .field("lazy", &self.lazy)
            .field("debounce", &self.debounce)
            .finish()
    }
}

/// A derivation attached to its target cell.
pub(crate) struct Computation {
    id: SubscriberId,
    target: WeakState,
    sources: Vec<WeakState>,
    derive: Box<Derive>,
    options: ComputeOptions,

    /// Set while the derivation runs; a nested trigger is skipped.
    computing: AtomicBool,

    /// Token of the latest run. Shared with pending futures.
    generation: Arc<AtomicU64>,

    activated: AtomicBool,
    subscriptions: Mutex<Option<Subscriptions>>,
}

impl Computation {
    fn new(target: &State, sources: &[State], derive: Box<Derive>, options: ComputeOptions) -> Arc<Self> {
        Arc::new(Self {
            id: SubscriberId::new(),
            target: target.downgrade(),
            sources: sources.iter().map(State::downgrade).collect(),
            derive,
            options,
            computing: AtomicBool::new(false),
            generation: Arc::new(AtomicU64::new(0)),
            activated: AtomicBool::new(false),
            subscriptions: Mutex::new(None),
        })
    }

    /// Start the computation on the next tick, once.
    pub fn activate(self: &Arc<Self>) {
        if self.activated.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::trace!(computation = ?self.id, "activating lazy computation");
        let this = Arc::clone(self);
        Runtime::defer(move || this.install());
    }

    /// Subscribe to the sources and run once.
    fn install(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let listener = Listener::new(move |_| {
            if let Some(computation) = weak.upgrade() {
                computation.run();
            }
        });

        let sources: Vec<State> = self.sources.iter().filter_map(WeakState::upgrade).collect();
        let options = SubscribeOptions::new().debounce(self.options.debounce);
        *self.subscriptions.lock() = Some(subscribe_all(&sources, &listener, options));

        self.run();
    }

    /// Detach from the sources and invalidate any pending result.
    fn retire(&self) {
        self.activated.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(subscriptions) = self.subscriptions.lock().take() {
            subscriptions.unsubscribe();
        }
    }

    fn run(&self) {
        struct Reset<'a>(&'a AtomicBool);

        impl Drop for Reset<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::SeqCst);
            }
        }

        if self.computing.swap(true, Ordering::SeqCst) {
            tracing::trace!(computation = ?self.id, "skipping re-entrant run");
            return;
        }
        let _reset = Reset(&self.computing);

        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(target) = self.target.upgrade() else {
            return;
        };

        let values: Vec<Value> = self
            .sources
            .iter()
            .filter_map(WeakState::upgrade)
            .map(|source| source.get_untracked())
            .collect();

        match untracked(|| (self.derive)(&values)) {
            Ok(Computed::Ready(value)) => {
                target.set(value);
            }
            Ok(Computed::Pending(future)) => {
                if target.is_async_aware() {
                    target.set(AsyncStatus::loading());
                }
                self.await_result(token, future);
            }
            Err(error) => report(self.options.on_error.as_ref(), &error),
        }
    }

    fn await_result(&self, token: u64, future: BoxFuture<'static, Result<Value, Value>>) {
        let generation = Arc::clone(&self.generation);
        let target = self.target.clone();
        let on_error = self.options.on_error.clone();
        let id = self.id;

        Runtime::spawn(async move {
            let result = future.await;
            if generation.load(Ordering::SeqCst) != token {
                tracing::debug!(computation = ?id, token, "dropping stale computation result");
                return;
            }
            let Some(target) = target.upgrade() else {
                return;
            };

            let aware = target.is_async_aware();
            match result {
                Ok(data) if aware => {
                    target.set(AsyncStatus::resolved(data));
                }
                Ok(data) => {
                    target.set(data);
                }
                Err(error) => {
                    if aware {
                        target.set(AsyncStatus::rejected(error.clone()));
                    }
                    report(on_error.as_ref(), &error);
                }
            }
        });
    }
}

fn report(on_error: Option<&ErrorHandler>, error: &Value) {
    match on_error {
        Some(handler) => handler(error),
        None => tracing::debug!(?error, "computation failed without an error handler"),
    }
}

impl State {
    /// Derive this cell from `sources`.
    ///
    /// `derive` receives the current source values in order. Replacing an
    /// earlier computation on the same cell detaches it and discards its
    /// pending results.
    pub fn compute<F>(&self, sources: &[State], derive: F, options: ComputeOptions) -> &Self
    where
        F: Fn(&[Value]) -> Result<Computed, Value> + Send + Sync + 'static,
    {
        let lazy = options.lazy;
        let computation = Computation::new(self, sources, Box::new(derive), options);

        let previous = self
            .store()
            .with_ext_mut(self.id(), |ext| ext.computation.replace(Arc::clone(&computation)))
            .flatten();
        if let Some(previous) = previous {
            previous.retire();
        }

        if !lazy {
            computation.activated.store(true, Ordering::SeqCst);
            computation.install();
        }
        self
    }

    /// Start a lazy computation targeting this cell, if there is one.
    pub(crate) fn activate_on_read(&self) {
        let computation = self
            .store()
            .with_ext(self.id(), |ext| ext.computation.clone())
            .flatten();
        if let Some(computation) = computation {
            computation.activate();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Store;
    use crate::reactive::DEFAULT_DEBOUNCE;
    use std::sync::atomic::AtomicI32;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn sum(values: &[Value]) -> Result<Computed, Value> {
        Ok(Computed::ready(
            values.iter().filter_map(Value::as_f64).sum::<f64>(),
        ))
    }

    #[test]
    fn eager_computation_runs_and_follows_sources() {
        let store = Store::new();
        let a = store.state(1);
        let b = store.state(2);
        let total = store.state(Value::Undefined);

        total.compute(&[a.clone(), b.clone()], sum, ComputeOptions::new());
        assert_eq!(total.get(), Value::from(3));

        a.set(10);
        assert_eq!(total.get(), Value::from(12));
    }

    #[test]
    fn errors_go_to_on_error() {
        let store = Store::new();
        let a = store.state(1);
        let target = store.state(0);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_clone = errors.clone();

        target.compute(
            &[a.clone()],
            |values| match values[0].as_f64() {
                Some(n) if n > 1.0 => Err(Value::from("too big")),
                _ => Ok(Computed::ready(1)),
            },
            ComputeOptions::new().on_error(move |error| errors_clone.lock().push(error.clone())),
        );

        a.set(5);
        assert_eq!(*errors.lock(), vec![Value::from("too big")]);
        assert_eq!(target.get(), Value::from(1));
    }

    #[test]
    fn errors_without_handler_are_swallowed() {
        let store = Store::new();
        let a = store.state(1);
        let target = store.state(0);

        target.compute(&[a.clone()], |_| Err(Value::from("boom")), ComputeOptions::new());
        a.set(2);
        assert_eq!(target.get(), Value::from(0));
    }

    #[test]
    fn self_referencing_derivation_does_not_recurse() {
        let store = Store::new();
        let counter = store.state(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        counter.compute(
            &[counter.clone()],
            move |values| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Computed::ready(values[0].as_f64().unwrap_or_default() + 1.0))
            },
            ComputeOptions::new(),
        );

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(counter.get(), Value::from(1));
    }

    #[test]
    fn recompute_replaces_the_previous_derivation() {
        let store = Store::new();
        let a = store.state(1);
        let target = store.state(0);

        target.compute(&[a.clone()], |_| Ok(Computed::ready("first")), ComputeOptions::new());
        target.compute(&[a.clone()], |_| Ok(Computed::ready("second")), ComputeOptions::new());
        assert_eq!(a.subscriber_count(), 1);

        target.set("manual");
        a.set(2);
        assert_eq!(target.get(), Value::from("second"));
    }

    #[test]
    fn lazy_without_runtime_activates_on_first_read() {
        let store = Store::new();
        let a = store.state(4);
        let doubled = store.state(Value::Undefined);

        doubled.compute(
            &[a.clone()],
            |values| Ok(Computed::ready(values[0].as_f64().unwrap_or_default() * 2.0)),
            ComputeOptions::new().lazy(true),
        );
        assert!(doubled.get_untracked().is_undefined());

        assert_eq!(doubled.get(), Value::from(8));
    }

    #[tokio::test]
    async fn lazy_activation_is_deferred_and_idempotent() {
        let store = Store::new();
        let a = store.state(4);
        let doubled = store.state(Value::Undefined);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        doubled.compute(
            &[a.clone()],
            move |values| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Computed::ready(values[0].as_f64().unwrap_or_default() * 2.0))
            },
            ComputeOptions::new().lazy(true),
        );

        assert!(doubled.get().is_undefined());
        assert!(doubled.get().is_undefined());
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(doubled.get(), Value::from(8));
    }

    fn counting_scaler(
        runs: &Arc<AtomicI32>,
        factor: f64,
    ) -> impl Fn(&[Value]) -> Result<Computed, Value> + Send + Sync + 'static {
        let runs = Arc::clone(runs);
        move |values| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(Computed::ready(values[0].as_f64().unwrap_or_default() * factor))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_computation_runs_once_per_burst() {
        let store = Store::new();
        let source = store.state(0);
        let target = store.state(Value::Undefined);
        let runs = Arc::new(AtomicI32::new(0));

        target.compute(
            &[source.clone()],
            counting_scaler(&runs, 2.0),
            ComputeOptions::new().debounce(true),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        for n in 1..=3 {
            source.set(n);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(target.get(), Value::from(0));

        tokio::time::sleep(DEFAULT_DEBOUNCE).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(target.get(), Value::from(6));
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_computation_cancels_its_pending_run() {
        let store = Store::new();
        let source = store.state(1);
        let target = store.state(Value::Undefined);
        let old_runs = Arc::new(AtomicI32::new(0));
        let new_runs = Arc::new(AtomicI32::new(0));

        target.compute(
            &[source.clone()],
            counting_scaler(&old_runs, 2.0),
            ComputeOptions::new().debounce(true),
        );
        source.set(4);
        target.compute(
            &[source.clone()],
            counting_scaler(&new_runs, 10.0),
            ComputeOptions::new().debounce(true),
        );

        tokio::time::sleep(DEFAULT_DEBOUNCE * 3).await;
        assert_eq!(old_runs.load(Ordering::SeqCst), 1);
        assert_eq!(new_runs.load(Ordering::SeqCst), 1);
        assert_eq!(target.get(), Value::from(40));
    }

    #[tokio::test]
    async fn stale_future_result_is_dropped() {
        let store = Store::new();
        let trigger = store.state(0);
        let target = store.state(Value::Undefined);
        let (first_tx, first_rx) = oneshot::channel::<Value>();
        let (second_tx, second_rx) = oneshot::channel::<Value>();
        let receivers = Arc::new(Mutex::new(vec![second_rx, first_rx]));

        target.compute(
            &[trigger.clone()],
            move |_| {
                let receiver = receivers.lock().pop();
                Ok(Computed::future(async move {
                    match receiver {
                        Some(receiver) => receiver.await.map_err(|_| Value::from("cancelled")),
                        None => Err(Value::from("no receiver")),
                    }
                }))
            },
            ComputeOptions::new(),
        );
        trigger.set(1);

        let _ = second_tx.send(Value::from("second"));
        tokio::task::yield_now().await;
        assert_eq!(target.get(), Value::from("second"));

        let _ = first_tx.send(Value::from("first"));
        tokio::task::yield_now().await;
        assert_eq!(target.get(), Value::from("second"));
    }
}
