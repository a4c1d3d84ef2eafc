//! Silent capture and rewind of raw cell values, for isolating test cases.

use super::state::State;
use crate::value::Value;

/// Raw root values captured by [`snapshot`].
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: Vec<(State, Value)>,
}

/// Capture the raw root value behind each of `states`.
pub fn snapshot<'a>(states: impl IntoIterator<Item = &'a State>) -> Snapshot {
    let entries = states
        .into_iter()
        .map(|state| {
            let root = state.root();
            let value = root.store().raw_root(root.id());
            (root, value)
        })
        .collect();
    Snapshot { entries }
}

impl Snapshot {
    /// Write every captured value back without comparing or notifying.
    pub fn restore(&self) {
        for (root, value) in &self.entries {
            root.store().set_raw_root(root.id(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
