//! Error types for cowfs
//!
//! This module provides error types for the filesystem layers with the following design goals:
//! - One small set of kinds shared by every store and by the copy-on-write core
//! - Not-found is always recognisable, whichever store produced it
//! - Collaborator errors outside those kinds pass through untouched

use std::io;
use thiserror::Error;

/// Result type alias using cowfs's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// cowfs error types.
#[derive(Error, Debug)]
pub enum Error {
    /// No entry at the given path in the consulted layer(s).
    #[error("not found")]
    NotFound,

    /// Operation forbidden by layering policy.
    ///
    /// Returned when renaming or removing a path that lives only in the base
    /// layer, and by read-only stores and handles for any write.
    #[error("permission denied")]
    PermissionDenied,

    /// Directory creation conflicts with an existing entry.
    #[error("already exists")]
    AlreadyExists,

    /// Any other error surfaced verbatim from a store.
    #[error("io error: {0}")]
    Io(io::Error),
}

impl Error {
    /// True when this error means "no entry at this path".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Build an underlying I/O error with a fixed message.
    pub(crate) fn other(message: &'static str) -> Self {
        Error::Io(io::Error::other(message))
    }
}

// Stores backed by the host report missing entries as io::ErrorKind::NotFound;
// fold those into Error::NotFound so path classification sees them.
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound,
            _ => Error::Io(err),
        }
    }
}
