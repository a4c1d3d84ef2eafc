//! Dynamic Values
//!
//! Cells store a [`Value`], a small JSON-like tree with a date variant.
//! Containers live behind `Arc`, so copying a value is cheap and a shallow
//! copy of a container shares every child it did not replace.
//!
//! # Identity
//!
//! Two notions of equality exist side by side:
//!
//! - [`Value::same`] is reference identity. Scalars compare by value, lists
//!   and objects compare by pointer. This is what cells use by default to
//!   decide whether a write changed anything.
//! - `PartialEq` is deep structural equality, mostly useful in tests and
//!   as an opt-in comparator.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered key/value storage used by [`Value::Object`].
pub type Object = IndexMap<String, Value>;

/// Largest number of `Undefined` holes a list write may open past its end.
pub const MAX_LIST_GAP: usize = 1024;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// A dynamically typed value held by a cell.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(Arc<str>),
    Date(NaiveDateTime),
    List(Arc<Vec<Value>>),
    Object(Arc<Object>),
}

/// Runtime tag of a [`Value`], used to select kind-specific helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    Text,
    Date,
    List,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::Text => "text",
            ValueKind::Date => "date",
            ValueKind::List => "list",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Build a list from anything convertible into values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Build an object from key/value pairs, keeping insertion order.
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::List(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `true` for `Undefined` and `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Loose truthiness: empty text, zero, NaN, `false` and nullish values
    /// are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Date(_) | Value::List(_) | Value::Object(_) => true,
        }
    }

    /// Reference identity. Containers are the same only if they share storage.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Read one path segment. Lists take numeric keys; anything that is not
    /// a container yields `Undefined`.
    pub fn child(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.get(key).cloned().unwrap_or_default(),
            Value::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default(),
            _ => Value::Undefined,
        }
    }

    /// Return a shallow copy with `key` replaced by `value`.
    ///
    /// A list grows with `Undefined` holes for an index at most
    /// [`MAX_LIST_GAP`] past its end. Any other key, including a larger
    /// index, turns the list into an object keyed by position.
    ///
    /// The receiver is never modified. Siblings of `key` keep their storage,
    /// so only the written path is copied.
    pub fn with_child(&self, key: &str, value: Value) -> Value {
        match self {
            Value::List(items) => match key.parse::<usize>() {
                Ok(index) if index.saturating_sub(items.len()) <= MAX_LIST_GAP => {
                    let mut items = items.as_ref().clone();
                    if index >= items.len() {
                        items.resize(index.saturating_add(1), Value::Undefined);
                    }
                    if let Some(slot) = items.get_mut(index) {
                        *slot = value;
                    }
                    Value::List(Arc::new(items))
                }
                _ => {
                    let mut map: Object = items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| (index.to_string(), item.clone()))
                        .collect();
                    map.insert(key.to_owned(), value);
                    Value::Object(Arc::new(map))
                }
            },
            Value::Object(map) => {
                let mut map = map.as_ref().clone();
                map.insert(key.to_owned(), value);
                Value::Object(Arc::new(map))
            }
            _ => Value::object([(key, value)]),
        }
    }

    /// Read a dotted path such as `"address.street"`.
    pub fn at_path(&self, path: &str) -> Value {
        path.split('.')
            .fold(self.clone(), |current, key| current.child(key))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => self.same(other),
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(f64, f32, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(Arc::new(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::list(iter)
    }
}

/// Whole numbers inside the exactly representable range serialize as integers.
fn integral(n: f64) -> Option<i64> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    (n.fract() == 0.0 && n.abs() <= MAX_SAFE).then_some(n as i64)
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::list(items),
            serde_json::Value::Object(map) => Value::object(map),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Value::Text(s) => serde_json::Value::String(s.to_string()),
            Value::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Into::into).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::Text(s) => serializer.serialize_str(s),
            Value::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_is_identity_for_containers() {
        let a = Value::list([1, 2, 3]);
        let b = Value::list([1, 2, 3]);

        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn same_is_value_equality_for_scalars() {
        assert!(Value::from(1).same(&Value::from(1.0)));
        assert!(Value::from("abc").same(&Value::from("abc".to_string())));
        assert!(!Value::Undefined.same(&Value::Null));
    }

    #[test]
    fn with_child_copies_only_the_written_path() {
        let original: Value = json!({ "a": { "b": 1 }, "c": { "d": 2 } }).into();
        let updated = original.with_child("a", Value::object([("b", 2)]));

        assert_eq!(original.at_path("a.b"), Value::from(1));
        assert_eq!(updated.at_path("a.b"), Value::from(2));
        assert!(original.child("c").same(&updated.child("c")));
    }

    #[test]
    fn with_child_pads_lists() {
        let list = Value::list([1]);
        let grown = list.with_child("3", Value::from(4));

        assert_eq!(
            grown,
            Value::list([Value::from(1), Value::Undefined, Value::Undefined, Value::from(4)])
        );
        assert_eq!(list.as_list().map(|items| items.len()), Some(1));
    }

    #[test]
    fn with_child_far_past_the_end_keys_by_position() {
        let list = Value::list([1]);

        let huge = list.with_child("100000000000", Value::from(2));
        assert_eq!(huge.kind(), ValueKind::Object);
        assert_eq!(huge.child("0"), Value::from(1));
        assert_eq!(huge.child("100000000000"), Value::from(2));

        let max = list.with_child(&usize::MAX.to_string(), Value::from(3));
        assert_eq!(max.child(&usize::MAX.to_string()), Value::from(3));

        let edge = list.with_child(&(1 + MAX_LIST_GAP).to_string(), Value::from(4));
        assert_eq!(edge.as_list().map(<[Value]>::len), Some(MAX_LIST_GAP + 2));
    }

    #[test]
    fn with_child_on_scalar_starts_an_object() {
        let value = Value::Undefined.with_child("age", Value::from(100));
        assert_eq!(value, Value::object([("age", 100)]));
    }

    #[test]
    fn child_reads_list_indexes() {
        let list = Value::list(["x", "y"]);
        assert_eq!(list.child("1"), Value::from("y"));
        assert!(list.child("7").is_undefined());
        assert!(list.child("name").is_undefined());
    }

    #[test]
    fn json_conversion_preserves_shape() {
        let source = json!({ "name": "Hung", "tags": ["a", "b"], "age": 99 });
        let value = Value::from(source.clone());

        assert_eq!(value.kind(), ValueKind::Object);
        assert_eq!(serde_json::Value::from(&value), source);
        assert_eq!(serde_json::to_value(&value).unwrap(), source);
    }
}
