//! Arithmetic on number cells.

use super::expect_kind;
use crate::error::Result;
use crate::reactive::State;
use crate::value::{Value, ValueKind};

pub trait NumberOps {
    fn add(&self, amount: f64) -> Result<&Self>;
    fn mul(&self, factor: f64) -> Result<&Self>;
    fn div(&self, divisor: f64) -> Result<&Self>;
}

impl NumberOps for State {
    fn add(&self, amount: f64) -> Result<&Self> {
        apply(self, |n| n + amount)
    }

    fn mul(&self, factor: f64) -> Result<&Self> {
        apply(self, |n| n * factor)
    }

    /// Division by zero follows IEEE 754 and yields an infinity or NaN.
    fn div(&self, divisor: f64) -> Result<&Self> {
        apply(self, |n| n / divisor)
    }
}

fn apply(state: &State, f: impl FnOnce(f64) -> f64) -> Result<&State> {
    state.try_mutate(|value| {
        expect_kind(&value, ValueKind::Number)?;
        Ok(Value::from(f(value.as_f64().unwrap_or_default())))
    })
}
