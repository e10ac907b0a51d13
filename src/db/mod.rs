//! Persistence module split across logical submodules, one per table. Every
//! function takes a plain `&Connection`; operations that write more than one
//! row open their own immediate transaction through [`write_transaction`].

mod books;
mod borrowings;
mod connection;
mod copies;
mod librarians;
mod publishers;
mod users;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::Result;

pub use books::{
    create_book, create_book_with_copies, delete_book, fetch_books, find_book_by_id,
    find_book_by_isbn, update_book,
};
pub use borrowings::{
    delete_borrowing, fetch_borrowing_details, fetch_borrowings, fetch_borrowings_for_user,
    fetch_open_borrowings, find_borrowing_by_id, find_open_borrowing_by_title,
    find_open_borrowing_for_copy,
};
pub use connection::{ensure_schema, open_database, open_in_memory};
pub use copies::{
    create_copy, delete_copy, fetch_available_copies, fetch_copies, fetch_copies_for_book,
    fetch_copy_details, fetch_status_drift, find_copy_by_id, find_copy_by_number, renumber_copy,
};
pub use librarians::{
    create_librarian, delete_librarian, fetch_librarians, find_librarian_by_id,
    find_librarian_for_user, update_librarian,
};
pub use publishers::{
    create_publisher, delete_publisher, fetch_publishers, find_publisher_by_id,
    find_publisher_by_name, update_publisher,
};
pub use users::{
    create_user, delete_user, fetch_users, find_user_by_email, find_user_by_id, is_librarian,
    update_user,
};

/// Begin a transaction that takes SQLite's write lock immediately, so checks
/// made inside it cannot be invalidated by another writer before commit.
///
/// Dropping the returned transaction without committing rolls it back.
pub(crate) fn write_transaction(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(
        conn,
        TransactionBehavior::Immediate,
    )?)
}
