//! Error types and result definitions for the h5db workspace.
//!
//! Every fallible operation across the workspace returns [`Result<T>`], whose
//! error variant is the single [`Error`] enum defined here. A shared enum keeps
//! error handling uniform across crate boundaries and lets failures propagate
//! naturally with the `?` operator.
//!
//! # Error Categories
//!
//! - **Open failures** ([`Error::OpenFailure`]): a file, dataset, object, or
//!   attribute could not be opened.
//! - **Unsupported types** ([`Error::UnsupportedType`]): element classes
//!   outside the supported set, ranks above four, non-integer run-starts.
//! - **Invariant violations** ([`Error::InvariantViolation`]): malformed
//!   run-start encodings detected during scan initialization.
//! - **Storage failures** ([`Error::StorageFailure`]): a read or selection
//!   against the storage layer failed after the handle was opened.
//! - **Domain errors** ([`Error::DomainError`]): invalid table-function
//!   arguments, such as an unknown encoding tag or a missing regular column.
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states;
//!   these should never surface during normal operation.

#![forbid(unsafe_code)]

use std::fmt;
use std::io;
use thiserror::Error;

/// Unified error type for all h5db operations.
///
/// Hosts embedding the table functions are expected to treat every variant as
/// a single I/O-style error category; the variants exist so tests and internal
/// code can match on the precise failure mode.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the standard library during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Arrow error while building or converting columnar output.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A file, dataset, object, or attribute could not be opened.
    #[error("{0}")]
    OpenFailure(String),

    /// The storage element type or shape is outside the supported set.
    #[error("{0}")]
    UnsupportedType(String),

    /// A run-start encoding invariant does not hold.
    #[error("{0}")]
    InvariantViolation(String),

    /// A storage read, selection, or decode failed.
    #[error("{0}")]
    StorageFailure(String),

    /// Invalid table-function input (bad argument shape, unknown encoding).
    #[error("{0}")]
    DomainError(String),

    /// Internal error indicating a bug or unexpected state.
    ///
    /// If you encounter this error it likely indicates a bug in h5db that
    /// should be reported with reproduction steps.
    #[error("an internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create an [`Error::OpenFailure`] from any displayable value.
    #[inline]
    pub fn open_failure<E: fmt::Display>(err: E) -> Self {
        Error::OpenFailure(err.to_string())
    }

    /// Create an [`Error::StorageFailure`] from any displayable value.
    #[inline]
    pub fn storage<E: fmt::Display>(err: E) -> Self {
        Error::StorageFailure(err.to_string())
    }

    /// Create an [`Error::UnsupportedType`] from any displayable value.
    #[inline]
    pub fn unsupported<E: fmt::Display>(err: E) -> Self {
        Error::UnsupportedType(err.to_string())
    }
}

/// Result alias used across the h5db workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;
