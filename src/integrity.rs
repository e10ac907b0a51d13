//! Referential integrity guard. Each check runs inside the caller's delete
//! transaction, before the delete itself, and fails with a conflict while the
//! row still has dependents. The schema's foreign keys are `RESTRICT`, so a
//! check missing here would surface as a storage error instead of silently
//! cascading.

use rusqlite::Connection;
use tracing::warn;

use crate::error::{LibraryError, Result};

fn exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)");
    Ok(conn.query_row(&sql, [id], |row| row.get(0))?)
}

fn count(conn: &Connection, sql: &str, id: i64) -> Result<i64> {
    Ok(conn.query_row(sql, [id], |row| row.get(0))?)
}

fn require(conn: &Connection, table: &str, label: &str, id: i64) -> Result<()> {
    if exists(conn, table, id)? {
        Ok(())
    } else {
        Err(LibraryError::not_found(format!("{label} {id}")))
    }
}

fn blocked(message: String) -> LibraryError {
    warn!(%message, "delete blocked by integrity guard");
    LibraryError::conflict(message)
}

/// A book may go once it owns no copies.
pub fn ensure_book_deletable(conn: &Connection, book_id: i64) -> Result<()> {
    require(conn, "books", "Book", book_id)?;
    let copies = count(conn, "SELECT COUNT(*) FROM copies WHERE book_id = ?1", book_id)?;
    if copies > 0 {
        return Err(blocked(format!(
            "Cannot delete book {book_id} with {copies} associated copies."
        )));
    }
    Ok(())
}

/// A publisher may go once it owns no books.
pub fn ensure_publisher_deletable(conn: &Connection, publisher_id: i64) -> Result<()> {
    require(conn, "publishers", "Publisher", publisher_id)?;
    let books = count(
        conn,
        "SELECT COUNT(*) FROM books WHERE publisher_id = ?1",
        publisher_id,
    )?;
    if books > 0 {
        return Err(blocked(format!(
            "Cannot delete publisher {publisher_id} with {books} associated books."
        )));
    }
    Ok(())
}

/// A user may go once they have no borrowing history and no librarian role.
pub fn ensure_user_deletable(conn: &Connection, user_id: i64) -> Result<()> {
    require(conn, "users", "User", user_id)?;
    let borrowings = count(
        conn,
        "SELECT COUNT(*) FROM borrowings WHERE user_id = ?1",
        user_id,
    )?;
    let librarian = count(
        conn,
        "SELECT COUNT(*) FROM librarians WHERE user_id = ?1",
        user_id,
    )?;
    if borrowings > 0 || librarian > 0 {
        return Err(blocked(format!(
            "Cannot delete user {user_id} associated with borrowings or librarian."
        )));
    }
    Ok(())
}

/// Librarian rows have no dependents; only existence is checked.
pub fn ensure_librarian_deletable(conn: &Connection, librarian_id: i64) -> Result<()> {
    require(conn, "librarians", "Librarian", librarian_id)
}

/// A copy keeps its borrowing history, so it may only go if it was never lent.
pub fn ensure_copy_deletable(conn: &Connection, copy_id: i64) -> Result<()> {
    require(conn, "copies", "Copy", copy_id)?;
    let borrowings = count(
        conn,
        "SELECT COUNT(*) FROM borrowings WHERE copy_id = ?1",
        copy_id,
    )?;
    if borrowings > 0 {
        return Err(blocked(format!(
            "Cannot delete copy {copy_id} with {borrowings} borrowing records."
        )));
    }
    Ok(())
}

/// An open borrowing backs its copy's `Borrowed` status and cannot be removed.
pub fn ensure_borrowing_deletable(conn: &Connection, borrowing_id: i64) -> Result<()> {
    require(conn, "borrowings", "Borrowing", borrowing_id)?;
    let open = count(
        conn,
        "SELECT COUNT(*) FROM borrowings WHERE id = ?1 AND return_date IS NULL",
        borrowing_id,
    )?;
    if open > 0 {
        return Err(blocked(format!(
            "Cannot delete borrowing {borrowing_id} while the copy is still out."
        )));
    }
    Ok(())
}
