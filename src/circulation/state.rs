//! Availability state of a copy and the transitions allowed between states.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::error::{LibraryError, Result};

/// Whether a copy is on the shelf or out on loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CopyStatus {
    #[default]
    Available,
    Borrowed,
}

impl CopyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CopyStatus::Available => "Available",
            CopyStatus::Borrowed => "Borrowed",
        }
    }

    /// The status implied by the number of open borrowings for a copy.
    pub fn from_open_borrowings(open: i64) -> Self {
        if open > 0 {
            CopyStatus::Borrowed
        } else {
            CopyStatus::Available
        }
    }

    /// Check if a state transition is valid
    pub fn can_transition_to(self, target: CopyStatus) -> bool {
        matches!(
            (self, target),
            (CopyStatus::Available, CopyStatus::Borrowed)
                | (CopyStatus::Borrowed, CopyStatus::Available)
        )
    }

    /// Move to `target`, rejecting self-transitions with a conflict.
    pub fn transition_to(self, target: CopyStatus) -> Result<CopyStatus> {
        if self.can_transition_to(target) {
            return Ok(target);
        }
        let message = match target {
            CopyStatus::Borrowed => "The book copy is already borrowed.",
            CopyStatus::Available => "The book copy is not borrowed.",
        };
        Err(LibraryError::conflict(message))
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CopyStatus {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Available" => Ok(CopyStatus::Available),
            "Borrowed" => Ok(CopyStatus::Borrowed),
            other => Err(LibraryError::invalid(format!("Unknown copy status: {other}"))),
        }
    }
}

impl ToSql for CopyStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CopyStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Available" => Ok(CopyStatus::Available),
            "Borrowed" => Ok(CopyStatus::Borrowed),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}
