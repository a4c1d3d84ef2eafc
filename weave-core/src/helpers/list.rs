//! List helpers.
//!
//! In-place edits (`push`, `pop`, `swap`, ...) go through a working copy
//! made by `Arc::make_mut`; edits that build a new list (`filter`, `map`,
//! `slice`, ...) replace it. Either way the cell ends up with a new list
//! identity, except where a helper can tell up front that nothing changes.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::reactive::State;
use crate::value::{Value, ValueKind};

pub trait ListOps {
    /// First element, or `None` when the list is empty or the element is
    /// `Undefined`. Tracked like [`State::get`].
    fn first(&self) -> Option<Value>;

    /// Last element, with the same rules as [`ListOps::first`].
    fn last(&self) -> Option<Value>;

    /// Append `items`. Appending nothing is a no-op.
    fn push<I, T>(&self, items: I) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>;

    /// Remove and return the last element.
    fn pop(&self) -> Result<Option<Value>>;

    /// Remove and return the first element.
    fn shift(&self) -> Result<Option<Value>>;

    /// Insert `items` at the front, keeping their order.
    fn unshift<I, T>(&self, items: I) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>;

    /// Remove `delete_count` elements at `start`, insert `items` in their
    /// place and return the removed elements. `start` is clamped to the
    /// list length.
    fn splice<I, T>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>;

    /// Keep the elements matching `predicate`.
    fn filter(&self, predicate: impl FnMut(&Value) -> bool) -> Result<&Self>;

    /// Stable sort with `compare`.
    fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<&Self>;

    /// Append `items` into a new list. Nested lists are spread one level.
    fn concat<I, T>(&self, items: I) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>;

    /// Overwrite every element with `value`.
    fn fill(&self, value: impl Into<Value>) -> Result<&Self>;

    /// Spread nested lists into their parent up to `depth` levels.
    fn flat(&self, depth: usize) -> Result<&Self>;

    fn map(&self, f: impl FnMut(&Value) -> Value) -> Result<&Self>;

    /// Fold the list into a single value, which replaces the list.
    fn reduce(&self, init: impl Into<Value>, f: impl FnMut(Value, &Value) -> Value)
        -> Result<&Self>;

    /// [`ListOps::reduce`] from the last element to the first.
    fn reduce_right(
        &self,
        init: impl Into<Value>,
        f: impl FnMut(Value, &Value) -> Value,
    ) -> Result<&Self>;

    /// Map every element, then fold the mapped values into one value.
    fn map_reduce(
        &self,
        mapper: impl FnMut(&Value) -> Value,
        init: impl Into<Value>,
        reducer: impl FnMut(Value, Value) -> Value,
    ) -> Result<&Self>;

    fn reverse(&self) -> Result<&Self>;

    /// Keep `start..end`, both clamped to the list length. `None` means the
    /// end of the list.
    fn slice(&self, start: usize, end: Option<usize>) -> Result<&Self>;

    /// Drop every element that is [`Value::same`] as one of `values`.
    fn exclude(&self, values: &[Value]) -> Result<&Self>;

    /// Remove the elements at `indexes`. Nothing is removed if any index is
    /// out of range.
    fn remove(&self, indexes: &[usize]) -> Result<&Self>;

    /// [`ListOps::filter`] followed by [`ListOps::map`] as one write.
    fn filter_map(
        &self,
        predicate: impl FnMut(&Value) -> bool,
        mapper: impl FnMut(&Value) -> Value,
    ) -> Result<&Self>;

    /// Exchange the elements at `a` and `b`.
    fn swap(&self, a: usize, b: usize) -> Result<&Self>;
}

impl ListOps for State {
    fn first(&self) -> Option<Value> {
        self.get()
            .as_list()
            .and_then(|items| items.first().cloned())
            .filter(|item| !item.is_undefined())
    }

    fn last(&self) -> Option<Value> {
        self.get()
            .as_list()
            .and_then(|items| items.last().cloned())
            .filter(|item| !item.is_undefined())
    }

    fn push<I, T>(&self, items: I) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        if items.is_empty() {
            expect_list(&self.get_untracked())?;
            return Ok(self);
        }
        edit_list(self, |list| list.extend(items))?;
        Ok(self)
    }

    fn pop(&self) -> Result<Option<Value>> {
        if expect_list(&self.get_untracked())?.is_empty() {
            return Ok(None);
        }
        edit_list(self, Vec::pop)
    }

    fn shift(&self) -> Result<Option<Value>> {
        if expect_list(&self.get_untracked())?.is_empty() {
            return Ok(None);
        }
        edit_list(self, |list| Some(list.remove(0)))
    }

    fn unshift<I, T>(&self, items: I) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        if items.is_empty() {
            expect_list(&self.get_untracked())?;
            return Ok(self);
        }
        edit_list(self, |list| {
            list.splice(0..0, items);
        })?;
        Ok(self)
    }

    fn splice<I, T>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        edit_list(self, |list| {
            let start = start.min(list.len());
            let end = start.saturating_add(delete_count).min(list.len());
            list.splice(start..end, items).collect()
        })
    }

    fn filter(&self, mut predicate: impl FnMut(&Value) -> bool) -> Result<&Self> {
        replace_list(self, |items| {
            let kept: Vec<Value> = items.iter().filter(|item| predicate(item)).cloned().collect();
            (kept.len() != items.len()).then_some(kept)
        })
    }

    fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<&Self> {
        edit_list(self, |list| list.sort_by(compare))?;
        Ok(self)
    }

    fn concat<I, T>(&self, items: I) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        replace_list(self, |current| {
            let mut next = current.to_vec();
            for item in items {
                match item.into() {
                    Value::List(nested) => next.extend(nested.iter().cloned()),
                    other => next.push(other),
                }
            }
            Some(next)
        })
    }

    fn fill(&self, value: impl Into<Value>) -> Result<&Self> {
        let value = value.into();
        edit_list(self, |list| list.fill(value))?;
        Ok(self)
    }

    fn flat(&self, depth: usize) -> Result<&Self> {
        replace_list(self, |items| {
            let mut flattened = Vec::with_capacity(items.len());
            flatten_into(items, depth, &mut flattened);
            Some(flattened)
        })
    }

    fn map(&self, f: impl FnMut(&Value) -> Value) -> Result<&Self> {
        replace_list(self, |items| Some(items.iter().map(f).collect()))
    }

    fn reduce(
        &self,
        init: impl Into<Value>,
        f: impl FnMut(Value, &Value) -> Value,
    ) -> Result<&Self> {
        let init = init.into();
        self.try_mutate(|value| Ok(expect_list(&value)?.iter().fold(init, f)))
    }

    fn reduce_right(
        &self,
        init: impl Into<Value>,
        f: impl FnMut(Value, &Value) -> Value,
    ) -> Result<&Self> {
        let init = init.into();
        self.try_mutate(|value| Ok(expect_list(&value)?.iter().rev().fold(init, f)))
    }

    fn map_reduce(
        &self,
        mapper: impl FnMut(&Value) -> Value,
        init: impl Into<Value>,
        reducer: impl FnMut(Value, Value) -> Value,
    ) -> Result<&Self> {
        let init = init.into();
        self.try_mutate(|value| Ok(expect_list(&value)?.iter().map(mapper).fold(init, reducer)))
    }

    fn reverse(&self) -> Result<&Self> {
        edit_list(self, |list| list.reverse())?;
        Ok(self)
    }

    fn slice(&self, start: usize, end: Option<usize>) -> Result<&Self> {
        replace_list(self, |items| {
            let end = end.unwrap_or(items.len()).min(items.len());
            let start = start.min(end);
            Some(items[start..end].to_vec())
        })
    }

    fn exclude(&self, values: &[Value]) -> Result<&Self> {
        if values.is_empty() {
            expect_list(&self.get_untracked())?;
            return Ok(self);
        }
        self.filter(|item| !values.iter().any(|value| value.same(item)))
    }

    fn remove(&self, indexes: &[usize]) -> Result<&Self> {
        let len = expect_list(&self.get_untracked())?.len();
        if indexes.is_empty() || indexes.iter().any(|&index| index >= len) {
            return Ok(self);
        }
        replace_list(self, |items| {
            Some(
                items
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| !indexes.contains(index))
                    .map(|(_, item)| item.clone())
                    .collect(),
            )
        })
    }

    fn filter_map(
        &self,
        mut predicate: impl FnMut(&Value) -> bool,
        mapper: impl FnMut(&Value) -> Value,
    ) -> Result<&Self> {
        replace_list(self, |items| {
            Some(items.iter().filter(|item| predicate(item)).map(mapper).collect())
        })
    }

    fn swap(&self, a: usize, b: usize) -> Result<&Self> {
        let len = expect_list(&self.get_untracked())?.len();
        if let Some(&index) = [a, b].iter().find(|&&index| index >= len) {
            return Err(Error::IndexOutOfRange { index, len });
        }
        if a == b {
            return Ok(self);
        }
        edit_list(self, |list| list.swap(a, b))?;
        Ok(self)
    }
}

fn expect_list(value: &Value) -> Result<&[Value]> {
    value
        .as_list()
        .ok_or_else(|| Error::kind_mismatch(ValueKind::List, value.kind()))
}

/// Edit a working copy of the list in place.
fn edit_list<R>(state: &State, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
    state.mutate_cloned(|value| match value {
        Value::List(items) => Ok(f(Arc::make_mut(items))),
        other => Err(Error::kind_mismatch(ValueKind::List, other.kind())),
    })
}

/// Replace the list with the result of `f`. `None` keeps the current list.
fn replace_list<'a>(
    state: &'a State,
    f: impl FnOnce(&[Value]) -> Option<Vec<Value>>,
) -> Result<&'a State> {
    state.try_mutate(|value| {
        let next = f(expect_list(&value)?);
        Ok(next.map_or(value, Value::from))
    })
}

fn flatten_into(items: &[Value], depth: usize, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::List(nested) if depth > 0 => flatten_into(nested, depth - 1, out),
            other => out.push(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Store;
    use crate::reactive::Listener;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn numbers(value: &Value) -> Vec<f64> {
        value
            .as_list()
            .unwrap()
            .iter()
            .map(|item| item.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn push_pop_shift_unshift() {
        let store = Store::new();
        let list = store.state(Value::list([2, 3]));

        list.push([4, 5]).unwrap();
        list.unshift([0, 1]).unwrap();
        assert_eq!(numbers(&list.get()), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(list.pop().unwrap(), Some(Value::from(5)));
        assert_eq!(list.shift().unwrap(), Some(Value::from(0)));
        assert_eq!(numbers(&list.get()), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn empty_edits_do_not_notify() {
        let store = Store::new();
        let list = store.state(Value::list(Vec::<Value>::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = list.subscribe(&Listener::new(move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        }));

        list.push(Vec::<Value>::new()).unwrap();
        assert_eq!(list.pop().unwrap(), None);
        assert_eq!(list.shift().unwrap(), None);
        list.exclude(&[]).unwrap();
        list.remove(&[]).unwrap();

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn first_and_last_skip_undefined() {
        let store = Store::new();
        let list = store.state(Value::list([Value::Undefined, Value::from(1)]));

        assert_eq!(list.first(), None);
        assert_eq!(list.last(), Some(Value::from(1)));

        let empty = store.state(Value::list(Vec::<Value>::new()));
        assert_eq!(empty.last(), None);
    }

    #[test]
    fn splice_returns_removed_elements() {
        let store = Store::new();
        let list = store.state(Value::list([1, 2, 3, 4]));

        let removed = list.splice(1, 2, ["a", "b", "c"]).unwrap();
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(list.get(), Value::list([Value::from(1), "a".into(), "b".into(), "c".into(), 4.into()]));

        let removed = list.splice(10, 1, [9]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(list.last(), Some(Value::from(9)));
    }

    #[test]
    fn exclude_compares_by_identity() {
        let store = Store::new();
        let shared = Value::list([1]);
        let list = store.state(Value::list([shared.clone(), Value::list([1]), Value::from(2)]));
        let before = list.get_untracked();

        list.exclude(&[Value::list([1])]).unwrap();
        assert!(list.get_untracked().same(&before));

        list.exclude(&[shared, Value::from(2)]).unwrap();
        assert_eq!(list.get(), Value::list([Value::list([1])]));
    }

    #[test]
    fn remove_ignores_out_of_range_requests() {
        let store = Store::new();
        let list = store.state(Value::list([10, 11, 12, 13]));
        let before = list.get_untracked();

        list.remove(&[1, 4]).unwrap();
        assert!(list.get_untracked().same(&before));

        list.remove(&[3, 1]).unwrap();
        assert_eq!(numbers(&list.get()), vec![10.0, 12.0]);
    }

    #[test]
    fn swap_checks_bounds() {
        let store = Store::new();
        let list = store.state(Value::list([1, 2, 3]));

        list.swap(0, 2).unwrap();
        assert_eq!(numbers(&list.get()), vec![3.0, 2.0, 1.0]);

        assert_eq!(
            list.swap(1, 3).err(),
            Some(Error::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn transforms_replace_the_list() {
        let store = Store::new();
        let list = store.state(Value::list([5, 1, 4, 2, 3]));

        list.filter_map(
            |item| item.as_f64().is_some_and(|n| n > 1.0),
            |item| Value::from(item.as_f64().unwrap_or_default() * 10.0),
        )
        .unwrap();
        assert_eq!(numbers(&list.get()), vec![50.0, 40.0, 20.0, 30.0]);

        list.sort_by(|a, b| a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal))
            .unwrap();
        list.reverse().unwrap();
        list.slice(1, Some(3)).unwrap();
        assert_eq!(numbers(&list.get()), vec![40.0, 30.0]);

        list.reduce(0, |sum, item| {
            Value::from(sum.as_f64().unwrap_or_default() + item.as_f64().unwrap_or_default())
        })
        .unwrap();
        assert_eq!(list.get(), Value::from(70));
    }

    #[test]
    fn right_fold_and_map_reduce() {
        let store = Store::new();
        let letters = store.state(Value::list(["a", "b", "c"]));

        letters
            .reduce_right("", |acc, item| {
                Value::from(format!(
                    "{}{}",
                    acc.as_str().unwrap_or_default(),
                    item.as_str().unwrap_or_default()
                ))
            })
            .unwrap();
        assert_eq!(letters.get(), Value::from("cba"));

        let words = store.state(Value::list(["weave", "core", "cells"]));
        words
            .map_reduce(
                |word| Value::from(word.as_str().map_or(0, str::len)),
                0,
                |total, len| {
                    Value::from(total.as_f64().unwrap_or_default() + len.as_f64().unwrap_or_default())
                },
            )
            .unwrap();
        assert_eq!(words.get(), Value::from(14));

        assert_eq!(
            letters.map_reduce(|item| item.clone(), 0, |acc, _| acc).err(),
            Some(Error::kind_mismatch(ValueKind::List, ValueKind::Text))
        );
    }

    #[test]
    fn flat_and_concat_spread_nested_lists() {
        let store = Store::new();
        let nested = Value::list([Value::from(1), Value::list([Value::from(2), Value::list([3])])]);
        let list = store.state(nested);

        list.flat(1).unwrap();
        assert_eq!(
            list.get(),
            Value::list([Value::from(1), Value::from(2), Value::list([3])])
        );
        list.flat(usize::MAX).unwrap();
        list.concat([Value::list([4, 5]), Value::from(6)]).unwrap();
        assert_eq!(numbers(&list.get()), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        list.fill(0).unwrap();
        assert_eq!(numbers(&list.get()), vec![0.0; 6]);
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let store = Store::new();
        let text = store.state("abc");

        assert_eq!(
            text.push([1]).err(),
            Some(Error::kind_mismatch(ValueKind::List, ValueKind::Text))
        );
        assert_eq!(
            text.pop().err(),
            Some(Error::kind_mismatch(ValueKind::List, ValueKind::Text))
        );
        assert_eq!(text.get(), Value::from("abc"));
    }
}
