//! Kind-Specific Helpers
//!
//! Each value kind gets a capability trait implemented for
//! [`State`](crate::State):
//!
//! - [`NumberOps`] for numbers
//! - [`DateOps`] for dates
//! - [`TextOps`] for text
//! - [`ObjectOps`] for objects
//! - [`ListOps`] for lists
//!
//! Every helper reads the current value, checks its [`ValueKind`] and writes
//! the result back through `State::try_mutate` or `State::mutate_cloned`,
//! so comparison and notification behave exactly like a plain `set`. Calling a helper on the wrong kind returns
//! [`Error::KindMismatch`](crate::Error::KindMismatch) and leaves the cell
//! alone.

mod date;
mod list;
mod number;
mod object;
mod text;

pub use date::{shift_date, DateOps, DateUnit};
pub use list::ListOps;
pub use number::NumberOps;
pub use object::ObjectOps;
pub use text::TextOps;

use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};

fn expect_kind(value: &Value, expected: ValueKind) -> Result<()> {
    if value.kind() == expected {
        Ok(())
    } else {
        Err(Error::kind_mismatch(expected, value.kind()))
    }
}
