//! Core library surface for the Library Manager TUI application.
//!
//! The interesting part is [`circulation`]: lending and returning copies while
//! keeping each copy's availability consistent with its borrowing records,
//! even with several connections writing at once. [`db`] holds one query
//! module per table and [`integrity`] the rules that block deletes of rows
//! that still have dependents.
pub mod circulation;
pub mod config;
pub mod db;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod models;
pub mod ui;

/// Borrow/return entry points used by the TUI and by tests.
pub use circulation::{borrow, return_copy};

pub use config::Config;
pub use error::{ErrorKind, LibraryError, Result};

pub use models::{Book, Borrowing, Copy, CopyStatus, Librarian, Publisher, User};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
