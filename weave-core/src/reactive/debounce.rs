//! Trailing-edge debouncing for listeners.
//!
//! A debounced listener collapses a burst of notifications into one call,
//! made `interval` after the last notification of the burst. The timer is
//! owned by the [`Subscription`](super::Subscription) and cancelled when it
//! is unsubscribed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::runtime::Runtime;
use super::subscriber::Listener;
use crate::value::Value;

/// Interval used by [`Debounce::Default`].
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(20);

/// Debounce setting for a subscription or computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Debounce {
    #[default]
    Off,

    /// Debounce with [`DEFAULT_DEBOUNCE`].
    Default,

    Interval(Duration),
}

impl Debounce {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Debounce::Off => None,
            Debounce::Default => Some(DEFAULT_DEBOUNCE),
            Debounce::Interval(interval) => Some(*interval),
        }
    }
}

impl From<bool> for Debounce {
    fn from(enabled: bool) -> Self {
        if enabled {
            Debounce::Default
        } else {
            Debounce::Off
        }
    }
}

impl From<Duration> for Debounce {
    fn from(interval: Duration) -> Self {
        Debounce::Interval(interval)
    }
}

/// Options for `subscribe_with`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    pub debounce: Debounce,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debounce(mut self, debounce: impl Into<Debounce>) -> Self {
        self.debounce = debounce.into();
        self
    }
}

/// The pending timer of one debounced listener.
pub(crate) struct DebounceTimer {
    interval: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: Mutex::new(None),
        }
    }

    /// Restart the timer so that `listener` runs after a full quiet interval.
    fn schedule(&self, listener: Listener, payload: Option<Value>) {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let fire = move || listener.notify(payload.as_ref());
        match Runtime::delay(self.interval, fire) {
            Ok(handle) => *pending = Some(handle),
            Err(fire) => {
                drop(pending);
                tracing::warn!("no tokio runtime: debounced listener runs immediately");
                fire();
            }
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}

/// Wrap `listener` according to `debounce`.
///
/// Returns the listener to install and, when debouncing, the timer owning
/// the pending call.
pub(crate) fn debounced(
    listener: &Listener,
    debounce: Debounce,
) -> (Listener, Option<Arc<DebounceTimer>>) {
    let Some(interval) = debounce.interval() else {
        return (listener.clone(), None);
    };

    let timer = Arc::new(DebounceTimer::new(interval));
    let inner = listener.clone();
    let wrapper_timer = Arc::clone(&timer);
    let wrapper = Listener::new(move |payload| {
        wrapper_timer.schedule(inner.clone(), payload.cloned());
    });

    (wrapper, Some(timer))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counting_listener() -> (Listener, Arc<AtomicI32>) {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let listener = Listener::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        (listener, calls)
    }

    #[test]
    fn debounce_conversions() {
        assert_eq!(Debounce::from(true).interval(), Some(DEFAULT_DEBOUNCE));
        assert_eq!(Debounce::from(false).interval(), None);
        assert_eq!(
            Debounce::from(Duration::from_millis(5)).interval(),
            Some(Duration::from_millis(5))
        );
    }

    #[test]
    fn off_returns_the_listener_itself() {
        let (listener, _) = counting_listener();
        let (installed, timer) = debounced(&listener, Debounce::Off);

        assert_eq!(installed.id(), listener.id());
        assert!(timer.is_none());
    }

    #[test]
    fn without_runtime_the_call_is_immediate() {
        let (listener, calls) = counting_listener();
        let (installed, _timer) = debounced(&listener, Debounce::Default);

        installed.notify(None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_trailing_call() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let listener = Listener::new(move |payload| {
            seen_clone.lock().push(payload.cloned());
        });
        let (installed, _timer) = debounced(&listener, Debounce::Default);

        installed.notify(Some(&Value::from(1)));
        tokio::time::sleep(Duration::from_millis(5)).await;
        installed.notify(Some(&Value::from(2)));
        tokio::time::sleep(Duration::from_millis(5)).await;
        installed.notify(Some(&Value::from(3)));

        tokio::time::sleep(Duration::from_millis(19)).await;
        assert!(seen.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*seen.lock(), vec![Some(Value::from(3))]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_call() {
        let (listener, calls) = counting_listener();
        let (installed, timer) = debounced(&listener, Debounce::Default);

        installed.notify(None);
        if let Some(timer) = timer {
            timer.cancel();
        }

        tokio::time::sleep(DEFAULT_DEBOUNCE * 2).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
