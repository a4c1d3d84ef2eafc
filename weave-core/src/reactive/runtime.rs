//! Host Scheduler
//!
//! Asynchronous completions, lazy activation and debounce timers all run on
//! the ambient tokio runtime. Everything else in the crate is synchronous.
//!
//! # Without a Runtime
//!
//! Cells work outside tokio too. Deferred work then runs inline, and
//! futures that cannot be polled to completion are dropped with a warning.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Entry point for scheduling work on the host runtime.
pub struct Runtime;

impl Runtime {
    /// The current tokio runtime, if this thread is inside one.
    pub fn handle() -> Option<Handle> {
        Handle::try_current().ok()
    }

    /// Whether async work can be scheduled from this thread.
    pub fn is_available() -> bool {
        Self::handle().is_some()
    }

    /// Spawn a task on the current runtime.
    ///
    /// Returns `None` and drops the future when there is no runtime.
    pub fn spawn<F>(future: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Self::handle() {
            Some(handle) => Some(handle.spawn(future)),
            None => {
                tracing::warn!("no tokio runtime: dropping async cell work");
                None
            }
        }
    }

    /// Run `f` on a later tick, or right away when there is no runtime.
    pub fn defer<F>(f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match Self::handle() {
            Some(handle) => {
                handle.spawn(async move { f() });
            }
            None => f(),
        }
    }

    /// Run `f` once `interval` has elapsed.
    ///
    /// Hands `f` back when there is no runtime to own the timer.
    pub fn delay<F>(interval: Duration, f: F) -> Result<JoinHandle<()>, F>
    where
        F: FnOnce() + Send + 'static,
    {
        match Self::handle() {
            Some(handle) => Ok(handle.spawn(async move {
                tokio::time::sleep(interval).await;
                f();
            })),
            None => Err(f),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
