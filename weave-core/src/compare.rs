//! Write comparators.
//!
//! A cell skips a write (and every notification) when its comparator says
//! the new value equals the current one.

use std::sync::Arc;

use crate::value::Value;

/// Equality predicate deciding whether a write is a no-op.
pub type Compare = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Reference identity, the default for every cell.
pub fn identity() -> Compare {
    Arc::new(Value::same)
}

/// Deep structural equality.
pub fn structural() -> Compare {
    Arc::new(|a: &Value, b: &Value| a == b)
}

/// Lists with the same length whose elements are pairwise [`Value::same`].
/// Anything else falls back to identity.
pub fn shallow() -> Compare {
    Arc::new(shallow_eq)
}

pub fn shallow_eq(a: &Value, b: &Value) -> bool {
    match (a.as_list(), b.as_list()) {
        (Some(a), Some(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y)),
        _ => a.same(b),
    }
}
