use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::Result;
use crate::integrity;
use crate::models::{Borrowing, BorrowingDetail};

use super::write_transaction;

const BORROWING_COLUMNS: &str = "id, user_id, copy_id, borrow_date, return_date";

pub(crate) fn row_to_borrowing(row: &Row<'_>) -> rusqlite::Result<Borrowing> {
    Ok(Borrowing {
        id: row.get(0)?,
        user_id: row.get(1)?,
        copy_id: row.get(2)?,
        borrow_date: row.get(3)?,
        return_date: row.get(4)?,
    })
}

fn query_borrowings<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<Borrowing>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BORROWING_COLUMNS} FROM borrowings {filter} ORDER BY borrow_date DESC, id DESC"
    ))?;
    let borrowings = stmt
        .query_map(params, row_to_borrowing)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(borrowings)
}

/// Full loan history, newest first.
pub fn fetch_borrowings(conn: &Connection) -> Result<Vec<Borrowing>> {
    query_borrowings(conn, "", [])
}

pub fn fetch_borrowings_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Borrowing>> {
    query_borrowings(conn, "WHERE user_id = ?1", [user_id])
}

/// Loans that have not been returned yet.
pub fn fetch_open_borrowings(conn: &Connection) -> Result<Vec<Borrowing>> {
    query_borrowings(conn, "WHERE return_date IS NULL", [])
}

pub fn find_borrowing_by_id(conn: &Connection, id: i64) -> Result<Option<Borrowing>> {
    Ok(conn
        .query_row(
            &format!("SELECT {BORROWING_COLUMNS} FROM borrowings WHERE id = ?1"),
            [id],
            row_to_borrowing,
        )
        .optional()?)
}

pub fn find_open_borrowing_for_copy(conn: &Connection, copy_id: i64) -> Result<Option<Borrowing>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {BORROWING_COLUMNS} FROM borrowings
                 WHERE copy_id = ?1 AND return_date IS NULL"
            ),
            [copy_id],
            row_to_borrowing,
        )
        .optional()?)
}

/// The user's open loan of a book with exactly this title, if any. When the
/// user holds several copies of the same title, the oldest loan is returned.
pub fn find_open_borrowing_by_title(
    conn: &Connection,
    user_id: i64,
    title: &str,
) -> Result<Option<Borrowing>> {
    Ok(conn
        .query_row(
            "SELECT br.id, br.user_id, br.copy_id, br.borrow_date, br.return_date
             FROM borrowings br
             INNER JOIN copies c ON c.id = br.copy_id
             INNER JOIN books b ON b.id = c.book_id
             WHERE br.user_id = ?1 AND b.title = ?2 AND br.return_date IS NULL
             ORDER BY br.borrow_date, br.id
             LIMIT 1",
            params![user_id, title],
            row_to_borrowing,
        )
        .optional()?)
}

/// Borrowings joined with the user's name, the book title and copy number.
pub fn fetch_borrowing_details(conn: &Connection, open_only: bool) -> Result<Vec<BorrowingDetail>> {
    let mut stmt = conn.prepare(
        "SELECT br.id, br.user_id, br.copy_id, br.borrow_date, br.return_date,
                u.name, b.title, c.copy_number
         FROM borrowings br
         INNER JOIN users u ON u.id = br.user_id
         INNER JOIN copies c ON c.id = br.copy_id
         INNER JOIN books b ON b.id = c.book_id
         WHERE ?1 = 0 OR br.return_date IS NULL
         ORDER BY br.return_date IS NOT NULL, br.borrow_date DESC, br.id DESC",
    )?;
    let details = stmt
        .query_map([open_only], |row| {
            Ok(BorrowingDetail {
                borrowing: row_to_borrowing(row)?,
                user_name: row.get(5)?,
                book_title: row.get(6)?,
                copy_number: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(details)
}

/// Remove a returned borrowing from the history.
pub fn delete_borrowing(conn: &Connection, id: i64) -> Result<()> {
    let tx = write_transaction(conn)?;
    integrity::ensure_borrowing_deletable(&tx, id)?;
    tx.execute("DELETE FROM borrowings WHERE id = ?1", [id])?;
    tx.commit()?;
    info!(borrowing_id = id, "deleted borrowing");
    Ok(())
}
