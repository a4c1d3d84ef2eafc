//! Dependency Tracking
//!
//! A tracking session records which cells a body read, so the caller can
//! subscribe to exactly those cells afterwards without declaring them.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. [`TrackingSession::begin`] pushes
//! a fresh frame, [`untracked`] pushes a frame that records nothing, and a
//! cell read registers itself into the top frame only. Nested sessions
//! therefore never share a dependency set; when one ends the outer session
//! resumes exactly where it left off.

use std::cell::RefCell;

use indexmap::IndexMap;

use super::state::State;
use super::subscriber::{Listener, SubscriberId, Subscriptions};
use crate::graph::NodeId;
use crate::value::Value;

enum Frame {
    Tracking {
        id: SubscriberId,
        cells: IndexMap<NodeId, State>,
    },
    Untracked,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Record a read of `state` into the innermost active session.
pub(crate) fn record(state: &State) {
    FRAMES.with(|frames| {
        if let Some(Frame::Tracking { cells, .. }) = frames.borrow_mut().last_mut() {
            cells
                .entry(state.id())
                .or_insert_with(|| state.clone());
        }
    });
}

/// Whether reads on this thread are currently being recorded.
pub fn is_tracking() -> bool {
    FRAMES.with(|frames| matches!(frames.borrow().last(), Some(Frame::Tracking { .. })))
}

/// An open tracking session.
///
/// Ending the session returns the collected [`Dependencies`]. A session
/// dropped without being ended is popped and its reads are discarded.
pub struct TrackingSession {
    id: SubscriberId,
    open: bool,
}

impl TrackingSession {
    /// Start recording reads on this thread.
    pub fn begin() -> Self {
        let id = SubscriberId::new();
        FRAMES.with(|frames| {
            frames.borrow_mut().push(Frame::Tracking {
                id,
                cells: IndexMap::new(),
            });
        });
        Self { id, open: true }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Stop recording and capture a baseline value for every cell read.
    pub fn end(mut self) -> Dependencies {
        self.open = false;
        let cells = pop(self.id);
        let baseline = cells.iter().map(State::get_untracked).collect();
        Dependencies { cells, baseline }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        if self.open {
            pop(self.id);
        }
    }
}

fn pop(id: SubscriberId) -> Vec<State> {
    FRAMES.with(|frames| match frames.borrow_mut().pop() {
        Some(Frame::Tracking { id: popped, cells }) => {
            debug_assert_eq!(popped, id, "tracking sessions ended out of order");
            cells.into_values().collect()
        }
        _ => {
            debug_assert!(false, "tracking session {id:?} was not on top of the stack");
            Vec::new()
        }
    })
}

/// Start a tracking session. See [`TrackingSession`].
pub fn begin_tracking() -> TrackingSession {
    TrackingSession::begin()
}

/// Run `f` in a new tracking session and return what it read.
pub fn track<R>(f: impl FnOnce() -> R) -> (R, Dependencies) {
    let session = TrackingSession::begin();
    let result = f();
    (result, session.end())
}

/// Run `f` without recording any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    struct Pop;

    impl Drop for Pop {
        fn drop(&mut self) {
            FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }

    FRAMES.with(|frames| frames.borrow_mut().push(Frame::Untracked));
    let _pop = Pop;
    f()
}

/// The cells a tracking session read, in first-read order.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    cells: Vec<State>,
    baseline: Vec<Value>,
}

impl Dependencies {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.cells.iter()
    }

    pub fn contains(&self, state: &State) -> bool {
        self.cells.contains(state)
    }

    /// Whether any tracked cell no longer holds its baseline value.
    pub fn has_changed(&self) -> bool {
        self.cells
            .iter()
            .zip(&self.baseline)
            .any(|(state, before)| !state.get_untracked().same(before))
    }

    /// Subscribe `listener` to every tracked cell.
    pub fn subscribe_all(&self, listener: &Listener) -> Subscriptions {
        self.cells
            .iter()
            .map(|state| state.subscribe(listener))
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
