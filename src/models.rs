//! Domain models that mirror the SQLite schema and get passed between the
//! persistence layer, the circulation workflow and the TUI. The row structs
//! stay light-weight data holders; the `New*` structs describe creation
//! requests and own the field validation that runs before anything touches
//! the database.

use std::fmt;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{LibraryError, Result};

pub use crate::circulation::CopyStatus;

lazy_static! {
    /// ISBN-10 or ISBN-13 (978/979 prefix), digits only, `X` check digit allowed.
    static ref ISBN_RE: Regex =
        Regex::new(r"^(97(8|9))?\d{9}(\d|X)$").expect("ISBN pattern compiles");
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
}

/// Check that `isbn` is a well-formed ISBN.
pub fn validate_isbn(isbn: &str) -> Result<()> {
    if ISBN_RE.is_match(isbn) {
        Ok(())
    } else {
        Err(LibraryError::invalid(format!("Invalid ISBN format: {isbn}")))
    }
}

/// Check that `email` looks like `local@domain.tld`.
pub fn validate_email(email: &str) -> Result<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(LibraryError::invalid(format!("Invalid email format: {email}")))
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(LibraryError::invalid(format!("{field} is required.")))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A library member. Every borrower is a user; librarians are users with an
/// extra role row.
pub struct User {
    pub id: i64,
    pub name: String,
    /// Globally unique.
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        require("Name", &self.name)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Employment record attached to exactly one [`User`].
pub struct Librarian {
    pub id: i64,
    pub user_id: i64,
    pub employment_date: NaiveDate,
    pub position: String,
}

#[derive(Debug, Clone)]
pub struct NewLibrarian {
    pub user_id: i64,
    pub employment_date: NaiveDate,
    pub position: String,
}

impl NewLibrarian {
    pub fn validate(&self) -> Result<()> {
        require("Position", &self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publisher {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl fmt::Display for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewPublisher {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl NewPublisher {
    pub fn validate(&self) -> Result<()> {
        require("Publisher name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A catalogue entry. Physical items are tracked separately as [`Copy`] rows.
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    /// Globally unique, see [`validate_isbn`].
    pub isbn: String,
    pub publisher_id: i64,
    /// Joined from `publishers` on every read, so renames show up at once.
    pub publisher_name: String,
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.author)
    }
}

#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub publication_year: i32,
    pub isbn: String,
    pub publisher_id: i64,
}

impl NewBook {
    pub fn validate(&self) -> Result<()> {
        require("Title", &self.title)?;
        require("Author", &self.author)?;
        validate_isbn(&self.isbn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One loanable instance of a [`Book`].
pub struct Copy {
    pub id: i64,
    pub book_id: i64,
    /// Unique within `book_id`.
    pub copy_number: i64,
    /// Stored mirror of "has an open borrowing". Only the circulation
    /// workflow writes it.
    pub status: CopyStatus,
}

#[derive(Debug, Clone)]
pub struct NewCopy {
    pub book_id: i64,
    pub copy_number: i64,
    pub initial_status: CopyStatus,
}

impl NewCopy {
    /// A new copy that starts out on the shelf.
    pub fn available(book_id: i64, copy_number: i64) -> Self {
        Self {
            book_id,
            copy_number,
            initial_status: CopyStatus::Available,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.copy_number < 1 {
            return Err(LibraryError::invalid(format!(
                "Copy number must be positive, got {}.",
                self.copy_number
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One loan event. Open while `return_date` is `None`.
pub struct Borrowing {
    pub id: i64,
    pub user_id: i64,
    pub copy_id: i64,
    pub borrow_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

impl Borrowing {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A borrowing joined with the names the history views display.
pub struct BorrowingDetail {
    pub borrowing: Borrowing,
    pub user_name: String,
    pub book_title: String,
    pub copy_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A copy joined with its book, used by the copy list in the TUI.
pub struct CopyDetail {
    pub copy: Copy,
    pub book_title: String,
    pub isbn: String,
}
