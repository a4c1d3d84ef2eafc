//! Effect Implementation
//!
//! An Effect is a side-effecting body that re-runs whenever the cells it
//! read change. It is the reference consumer of the tracking protocol and
//! behaves the way a view binding host would.
//!
//! # How Effects Work
//!
//! 1. The body runs inside a tracking session. Afterwards the effect
//!    subscribes to every cell the body read and remembers their values.
//!
//! 2. When any of those cells notifies, the effect checks whether a tracked
//!    value actually changed identity. Lens cells share their root's
//!    subscriber set, so most notifications concern some other path.
//!
//! 3. On a real change the effect drops all of its subscriptions and runs
//!    the body again from scratch.
//!
//! # Errors
//!
//! A failing body does not propagate to the writer that triggered it. The
//! error is stored and returned by the next call to [`Effect::execute`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::{Dependencies, TrackingSession};
use super::subscriber::{Listener, Subscriptions};
use crate::error::BoxError;

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Body = dyn Fn() -> Result<(), BoxError> + Send + Sync;

struct EffectInner {
    id: u64,
    run: Box<Body>,

    /// Installed on every tracked cell. Holds only a weak reference back.
    listener: Listener,

    dependencies: Mutex<Dependencies>,
    subscriptions: Mutex<Subscriptions>,
    failure: Mutex<Option<BoxError>>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use weave_core::{Effect, State};
///
/// let count = State::new(0);
/// let seen = count.clone();
///
/// let effect = Effect::new(move || {
///     println!("count is {:?}", seen.get());
///     Ok(())
/// });
///
/// count.set(5);
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it once to establish its dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.inner.run_tracked();
        effect
    }

    /// Create a new effect without running it.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &std::sync::Weak<EffectInner>| {
            let weak = weak.clone();
            EffectInner {
                id: next_effect_id(),
                run: Box::new(run),
                listener: Listener::new(move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate();
                    }
                }),
                dependencies: Mutex::new(Dependencies::default()),
                subscriptions: Mutex::new(Subscriptions::default()),
                failure: Mutex::new(None),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }
        });
        Self { inner }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Run the body now.
    ///
    /// If the previous run failed, its error is returned instead and the
    /// body is not run.
    pub fn execute(&self) -> Result<(), BoxError> {
        if self.is_disposed() {
            return Ok(());
        }
        if let Some(error) = self.inner.failure.lock().take() {
            return Err(error);
        }
        self.inner.run_tracked();
        Ok(())
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.lock());
        subscriptions.unsubscribe();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the body has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of cells read by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl EffectInner {
    fn run_tracked(&self) {
        let previous = std::mem::take(&mut *self.subscriptions.lock());
        previous.unsubscribe();

        let session = TrackingSession::begin();
        let result = (self.run)();
        let dependencies = session.end();

        let subscriptions = dependencies.subscribe_all(&self.listener);
        *self.subscriptions.lock() = subscriptions;
        *self.dependencies.lock() = dependencies;
        self.run_count.fetch_add(1, Ordering::SeqCst);

        if let Err(error) = &result {
            tracing::debug!(effect = self.id, %error, "effect body failed");
        }
        *self.failure.lock() = result.err();
    }

    fn invalidate(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if !self.dependencies.lock().has_changed() {
            return;
        }
        self.run_tracked();
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
