//! Error types shared by the persistence layer and the circulation workflow.
//!
//! Every fallible library operation returns [`Result`], whose error carries one
//! of a handful of kinds. The front-end only ever needs the kind and the
//! message, so variants hold a human-readable description rather than
//! structured payloads.

use rusqlite::{Error as SqlError, ErrorCode};
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Coarse classification of a [`LibraryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Storage,
}

/// Main error type for library operations.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// A required field is missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation, blocked delete, double borrow or double return.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// SQLite failure that does not map onto a domain error.
    #[error("Database error: {0}")]
    Storage(#[from] SqlError),

    /// Filesystem failure while preparing the data directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// Coerce SQLite constraint errors (unique, check, foreign key) into a
    /// [`LibraryError::Conflict`] carrying `message`. Anything else stays a
    /// storage error.
    pub(crate) fn from_constraint(err: SqlError, message: impl FnOnce() -> String) -> Self {
        if matches!(
            err.sqlite_error_code(),
            Some(ErrorCode::ConstraintViolation)
        ) {
            Self::Conflict(message())
        } else {
            Self::Storage(err)
        }
    }
}
