//! String helpers for text cells.

use super::expect_kind;
use crate::error::Result;
use crate::reactive::State;
use crate::value::{Value, ValueKind};

pub trait TextOps {
    /// Replace the first occurrence of `from`.
    fn replace(&self, from: &str, to: &str) -> Result<&Self>;

    /// Keep the characters between `start` and `end`.
    ///
    /// Both bounds are clamped to the text length and swapped when
    /// `start > end`.
    fn substring(&self, start: usize, end: usize) -> Result<&Self>;

    /// Keep up to `length` characters starting at `start`. A `start` past
    /// the end leaves empty text.
    fn substr(&self, start: usize, length: usize) -> Result<&Self>;

    fn trim(&self) -> Result<&Self>;
    fn upper(&self) -> Result<&Self>;
    fn lower(&self) -> Result<&Self>;

    /// Turn the text into a list of parts. An empty separator splits into
    /// single characters.
    fn split(&self, separator: &str) -> Result<&Self>;
}

impl TextOps for State {
    fn replace(&self, from: &str, to: &str) -> Result<&Self> {
        edit_text(self, |text| Value::from(text.replacen(from, to, 1)))
    }

    fn substring(&self, start: usize, end: usize) -> Result<&Self> {
        edit_text(self, |text| {
            let len = text.chars().count();
            let (start, end) = (start.min(len), end.min(len));
            let (start, end) = if start > end { (end, start) } else { (start, end) };
            text.chars().skip(start).take(end - start).collect::<String>().into()
        })
    }

    fn substr(&self, start: usize, length: usize) -> Result<&Self> {
        edit_text(self, |text| text.chars().skip(start).take(length).collect::<String>().into())
    }

    fn trim(&self) -> Result<&Self> {
        edit_text(self, |text| Value::from(text.trim()))
    }

    fn upper(&self) -> Result<&Self> {
        edit_text(self, |text| Value::from(text.to_uppercase()))
    }

    fn lower(&self) -> Result<&Self> {
        edit_text(self, |text| Value::from(text.to_lowercase()))
    }

    fn split(&self, separator: &str) -> Result<&Self> {
        edit_text(self, |text| {
            if separator.is_empty() {
                text.chars().map(String::from).collect()
            } else {
                text.split(separator).collect()
            }
        })
    }
}

fn edit_text(state: &State, f: impl FnOnce(&str) -> Value) -> Result<&State> {
    state.try_mutate(|value| {
        expect_kind(&value, ValueKind::Text)?;
        Ok(f(value.as_str().unwrap_or_default()))
    })
}
