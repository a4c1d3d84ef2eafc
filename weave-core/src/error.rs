//! Error types shared by every fallible cell operation.

use thiserror::Error;

use crate::value::ValueKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by effect bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid chunk size {size}: a chunk must hold at least 2 items")]
    InvalidChunkSize { size: usize },

    #[error("chunks were read before a chunk size was declared")]
    ChunksUndeclared,

    #[error("invalid date duration {modifier:?}")]
    InvalidDateModifier { modifier: String },

    #[error("date arithmetic left the representable range")]
    DateOutOfRange,

    #[error("expected a {expected} value, found {found}")]
    KindMismatch { expected: ValueKind, found: ValueKind },

    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

impl Error {
    pub(crate) fn kind_mismatch(expected: ValueKind, found: ValueKind) -> Self {
        Self::KindMismatch { expected, found }
    }
}
