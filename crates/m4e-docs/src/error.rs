//! Document cache error types.

use std::io;
use thiserror::Error;

/// Result type for cache record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised while reading or writing a cache record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// IO error on the record file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The record ended before a required field.
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// A header field is out of order.
    #[error("expected field {expected}, found {found}")]
    UnexpectedField {
        expected: &'static str,
        found: String,
    },

    /// The record was written by an incompatible format version.
    #[error("unsupported record format version {0}")]
    VersionMismatch(String),

    /// A field is not framed correctly.
    #[error("malformed field at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    /// A metadata field is not valid UTF-8.
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(String),
}

impl RecordError {
    pub(crate) fn malformed(offset: usize, reason: &'static str) -> Self {
        Self::Malformed { offset, reason }
    }

    /// Returns true if the record itself is bad, as opposed to the file
    /// being unreadable.
    pub fn is_corrupt(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Errors reported by a remote document fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The document service answered with an error.
    #[error("document service error ({code}): {reason}")]
    Remote { code: u16, reason: String },

    /// The document does not exist.
    #[error("document {0} not found")]
    NotFound(String),

    /// The request did not reach the service.
    #[error("document service unreachable: {0}")]
    Unreachable(String),
}

impl FetchError {
    /// Creates a remote service error.
    pub fn remote(code: u16, reason: impl Into<String>) -> Self {
        Self::Remote {
            code,
            reason: reason.into(),
        }
    }
}
