//! Object helpers. `Undefined` counts as an empty object for the helpers
//! that build on an existing object.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::reactive::State;
use crate::value::{Object, Value, ValueKind};

pub trait ObjectOps {
    /// Set the value only if it is currently `Undefined`.
    fn def(&self, default: impl Into<Value>) -> &Self;

    /// [`ObjectOps::def`] on the cell at `path`.
    fn def_at(&self, path: &str, default: impl Into<Value>) -> &Self;

    /// Replace the value with its negated truthiness.
    fn toggle(&self) -> &Self;

    /// Negate the truthiness of each of `keys`.
    fn toggle_keys(&self, keys: &[&str]) -> Result<&Self>;

    /// Remove `keys`. Removing nothing leaves the value untouched.
    fn unset(&self, keys: &[&str]) -> Result<&Self>;

    /// Merge the entries of `patch` into a new object.
    fn assign(&self, patch: impl Into<Value>) -> Result<&Self>;
}

impl ObjectOps for State {
    fn def(&self, default: impl Into<Value>) -> &Self {
        self.mutate(|current| {
            if current.is_undefined() {
                default.into()
            } else {
                current
            }
        })
    }

    fn def_at(&self, path: &str, default: impl Into<Value>) -> &Self {
        self.prop(path).def(default);
        self
    }

    fn toggle(&self) -> &Self {
        self.mutate(|current| Value::Bool(!current.is_truthy()))
    }

    fn toggle_keys(&self, keys: &[&str]) -> Result<&Self> {
        if keys.is_empty() {
            return Ok(self);
        }
        edit_object(self, |object| {
            for key in keys {
                let flipped = !object.get(*key).is_some_and(Value::is_truthy);
                object.insert((*key).to_string(), Value::Bool(flipped));
            }
        })
    }

    fn unset(&self, keys: &[&str]) -> Result<&Self> {
        let current = self.get_untracked();
        let present = match &current {
            Value::Object(object) => keys.iter().any(|key| object.contains_key(*key)),
            Value::Undefined => false,
            other => return Err(Error::kind_mismatch(ValueKind::Object, other.kind())),
        };
        if !present {
            return Ok(self);
        }
        edit_object(self, |object| {
            for key in keys {
                object.shift_remove(*key);
            }
        })
    }

    fn assign(&self, patch: impl Into<Value>) -> Result<&Self> {
        let patch = patch.into();
        let entries = patch
            .as_object()
            .ok_or_else(|| Error::kind_mismatch(ValueKind::Object, patch.kind()))?;
        edit_object(self, |object| {
            for (key, value) in entries {
                object.insert(key.clone(), value.clone());
            }
        })
    }
}

/// Edit a copy of the object. `Undefined` starts from an empty object.
fn edit_object<'a>(state: &'a State, f: impl FnOnce(&mut Object)) -> Result<&'a State> {
    state.try_mutate(|value| {
        let mut object = match value {
            Value::Object(object) => object,
            Value::Undefined => Arc::new(Object::new()),
            other => return Err(Error::kind_mismatch(ValueKind::Object, other.kind())),
        };
        f(Arc::make_mut(&mut object));
        Ok(Value::Object(object))
    })
}
