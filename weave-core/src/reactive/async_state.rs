//! Async Cells
//!
//! An async-aware cell holds a tri-state record
//! `{ loading, done, data, error }` instead of a bare value.
//!
//! - [`State::make_async`] arms a cell and normalizes its current value.
//! - [`State::drive`] feeds a future into the cell. A newer call supersedes
//!   an older one, so a late settlement never overwrites a newer state.
//! - [`State::project`] maps the current record onto a result through a
//!   [`AsyncProjection`].

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures_util::FutureExt;

use super::runtime::Runtime;
use super::state::State;
use crate::value::{Object, Value};

/// The record stored by an async-aware cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AsyncStatus {
    pub loading: bool,
    pub done: bool,
    pub data: Value,
    pub error: Value,
}

impl AsyncStatus {
    /// Neither loading nor done.
    pub fn initial() -> Self {
        Self::default()
    }

    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn resolved(data: impl Into<Value>) -> Self {
        Self {
            done: true,
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn rejected(error: impl Into<Value>) -> Self {
        Self {
            done: true,
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_nullish()
    }

    /// Read a record back out of a cell value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let loading = object.get("loading")?.as_bool()?;
        let done = object.get("done")?.as_bool()?;
        Some(Self {
            loading,
            done,
            data: value.child("data"),
            error: value.child("error"),
        })
    }

    /// `Undefined` becomes the initial record, an existing record is kept
    /// and any other value becomes resolved data.
    pub fn normalize(value: &Value) -> Self {
        if value.is_undefined() {
            return Self::initial();
        }
        Self::from_value(value).unwrap_or_else(|| Self::resolved(value.clone()))
    }
}

impl From<AsyncStatus> for Value {
    fn from(status: AsyncStatus) -> Self {
        let mut object = Object::with_capacity(4);
        object.insert("loading".to_string(), Value::Bool(status.loading));
        object.insert("done".to_string(), Value::Bool(status.done));
        object.insert("data".to_string(), status.data);
        object.insert("error".to_string(), status.error);
        Value::from(object)
    }
}

fn settle(result: Result<Value, Value>) -> AsyncStatus {
    match result {
        Ok(data) => AsyncStatus::resolved(data),
        Err(error) => AsyncStatus::rejected(error),
    }
}

impl State {
    /// Mark the cell async-aware and normalize its value into a record.
    pub fn make_async(&self) -> &Self {
        self.store()
            .with_ext_mut(self.id(), |ext| ext.async_aware = true);

        let current = self.get_untracked();
        if AsyncStatus::from_value(&current).is_none() {
            self.set(AsyncStatus::normalize(&current));
        }
        self
    }

    pub fn is_async_aware(&self) -> bool {
        self.store()
            .with_ext(self.id(), |ext| ext.async_aware)
            .unwrap_or(false)
    }

    /// The current value as a record. Tracked like [`State::get`].
    pub fn status(&self) -> AsyncStatus {
        AsyncStatus::normalize(&self.get())
    }

    /// Drive the cell from `future`.
    ///
    /// The cell shows a loading record until the future settles, then a
    /// done record carrying either `data` or `error`. A future that is
    /// already complete is committed without a loading phase.
    ///
    /// Outside a tokio runtime the future is never polled: the cell stays
    /// loading and the work is dropped with a warning.
    pub fn drive<F>(&self, future: F) -> &Self
    where
        F: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        let token_cell = self
            .store()
            .with_ext_mut(self.id(), |ext| {
                ext.async_aware = true;
                Arc::clone(&ext.async_token)
            })
            .unwrap_or_default();
        let token = token_cell.fetch_add(1, Ordering::SeqCst) + 1;

        let mut future = future.boxed();
        if Runtime::is_available() {
            if let Some(result) = future.as_mut().now_or_never() {
                self.set(settle(result));
                return self;
            }
        }

        self.set(AsyncStatus::loading());
        let target = self.downgrade();
        Runtime::spawn(async move {
            let result = future.await;
            if token_cell.load(Ordering::SeqCst) != token {
                tracing::debug!(cell = %target.id(), token, "dropping stale async result");
                return;
            }
            if let Some(target) = target.upgrade() {
                target.set(settle(result));
            }
        });
        self
    }

    /// Start a projection of the current record.
    pub fn project<'a, R: 'a>(&self) -> AsyncProjection<'a, R> {
        AsyncProjection::new(self.status())
    }
}

type Branch<'a, R> = Box<dyn FnOnce(&AsyncStatus) -> R + 'a>;

/// Maps an [`AsyncStatus`] onto a result.
///
/// Branches are tried in order: `done`, `loading`, `success`, `error`,
/// `fallback`. `done` yields to `error` when the record carries an error
/// and an error branch exists. [`AsyncProjection::resolve`] returns `None`
/// when nothing matches.
pub struct AsyncProjection<'a, R> {
    status: AsyncStatus,
    done: Option<Branch<'a, R>>,
    loading: Option<Branch<'a, R>>,
    success: Option<Branch<'a, R>>,
    error: Option<Branch<'a, R>>,
    fallback: Option<Branch<'a, R>>,
}

impl<'a, R: 'a> AsyncProjection<'a, R> {
    pub fn new(status: AsyncStatus) -> Self {
        Self {
            status,
            done: None,
            loading: None,
            success: None,
            error: None,
            fallback: None,
        }
    }

    /// Called with `(data, error)` once the record is done.
    pub fn done(mut self, f: impl FnOnce(&Value, &Value) -> R + 'a) -> Self {
        self.done = Some(Box::new(move |status| f(&status.data, &status.error)));
        self
    }

    pub fn loading(mut self, f: impl FnOnce() -> R + 'a) -> Self {
        self.loading = Some(Box::new(move |_| f()));
        self
    }

    /// Called with `data` when done without an error.
    pub fn success(mut self, f: impl FnOnce(&Value) -> R + 'a) -> Self {
        self.success = Some(Box::new(move |status| f(&status.data)));
        self
    }

    pub fn error(mut self, f: impl FnOnce(&Value) -> R + 'a) -> Self {
        self.error = Some(Box::new(move |status| f(&status.error)));
        self
    }

    pub fn fallback(mut self, f: impl FnOnce() -> R + 'a) -> Self {
        self.fallback = Some(Box::new(move |_| f()));
        self
    }

    pub fn done_value(self, value: R) -> Self {
        self.done(move |_, _| value)
    }

    pub fn loading_value(self, value: R) -> Self {
        self.loading(move || value)
    }

    pub fn success_value(self, value: R) -> Self {
        self.success(move |_| value)
    }

    pub fn error_value(self, value: R) -> Self {
        self.error(move |_| value)
    }

    pub fn fallback_value(self, value: R) -> Self {
        self.fallback(move || value)
    }

    pub fn resolve(self) -> Option<R> {
        let status = &self.status;
        let failed = status.has_error();

        let branch = if status.done && !(failed && self.error.is_some()) && self.done.is_some() {
            self.done
        } else if status.loading && self.loading.is_some() {
            self.loading
        } else if status.done && !failed && self.success.is_some() {
            self.success
        } else if failed && self.error.is_some() {
            self.error
        } else {
            self.fallback
        };

        branch.map(|f| f(status))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
