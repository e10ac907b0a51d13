use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{LibraryError, Result};
use crate::integrity;
use crate::models::{Copy, CopyDetail, CopyStatus, NewCopy};

use super::write_transaction;

fn row_to_copy(row: &Row<'_>) -> rusqlite::Result<Copy> {
    Ok(Copy {
        id: row.get(0)?,
        book_id: row.get(1)?,
        copy_number: row.get(2)?,
        status: row.get(3)?,
    })
}

fn query_copies<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Copy>> {
    let mut stmt = conn.prepare(sql)?;
    let copies = stmt
        .query_map(params, row_to_copy)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(copies)
}

/// Insert without opening a transaction; shared with the book batch insert.
pub(super) fn insert_copy(conn: &Connection, new: &NewCopy) -> Result<Copy> {
    new.validate()?;
    let book_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM books WHERE id = ?1)",
        [new.book_id],
        |row| row.get(0),
    )?;
    if !book_exists {
        return Err(LibraryError::not_found(format!("Book {}", new.book_id)));
    }

    conn.execute(
        "INSERT INTO copies (book_id, copy_number, status) VALUES (?1, ?2, ?3)",
        params![new.book_id, new.copy_number, new.initial_status],
    )
    .map_err(|err| {
        LibraryError::from_constraint(err, || {
            format!(
                "Copy number {} already exists for book {}.",
                new.copy_number, new.book_id
            )
        })
    })?;

    Ok(Copy {
        id: conn.last_insert_rowid(),
        book_id: new.book_id,
        copy_number: new.copy_number,
        status: new.initial_status,
    })
}

/// Add a copy to an existing book. The copy number must be free for that book.
pub fn create_copy(conn: &Connection, new: &NewCopy) -> Result<Copy> {
    let tx = write_transaction(conn)?;
    let copy = insert_copy(&tx, new)?;
    tx.commit()?;
    info!(copy_id = copy.id, book_id = copy.book_id, "created copy");
    Ok(copy)
}

pub fn fetch_copies(conn: &Connection) -> Result<Vec<Copy>> {
    query_copies(
        conn,
        "SELECT id, book_id, copy_number, status FROM copies ORDER BY book_id, copy_number",
        [],
    )
}

pub fn fetch_copies_for_book(conn: &Connection, book_id: i64) -> Result<Vec<Copy>> {
    query_copies(
        conn,
        "SELECT id, book_id, copy_number, status FROM copies
         WHERE book_id = ?1 ORDER BY copy_number",
        [book_id],
    )
}

/// Copies currently on the shelf.
pub fn fetch_available_copies(conn: &Connection) -> Result<Vec<Copy>> {
    query_copies(
        conn,
        "SELECT id, book_id, copy_number, status FROM copies
         WHERE status = ?1 ORDER BY book_id, copy_number",
        [CopyStatus::Available],
    )
}

pub fn find_copy_by_id(conn: &Connection, id: i64) -> Result<Option<Copy>> {
    Ok(conn
        .query_row(
            "SELECT id, book_id, copy_number, status FROM copies WHERE id = ?1",
            [id],
            row_to_copy,
        )
        .optional()?)
}

pub fn find_copy_by_number(
    conn: &Connection,
    book_id: i64,
    copy_number: i64,
) -> Result<Option<Copy>> {
    Ok(conn
        .query_row(
            "SELECT id, book_id, copy_number, status FROM copies
             WHERE book_id = ?1 AND copy_number = ?2",
            params![book_id, copy_number],
            row_to_copy,
        )
        .optional()?)
}

/// Every copy with its book's title, for list views.
pub fn fetch_copy_details(conn: &Connection) -> Result<Vec<CopyDetail>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.book_id, c.copy_number, c.status, b.title, b.isbn
         FROM copies c
         INNER JOIN books b ON b.id = c.book_id
         ORDER BY b.title COLLATE NOCASE, c.copy_number",
    )?;
    let details = stmt
        .query_map([], |row| {
            Ok(CopyDetail {
                copy: row_to_copy(row)?,
                book_title: row.get(4)?,
                isbn: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(details)
}

/// Copies whose stored status disagrees with their open borrowings. Empty
/// whenever the availability invariant holds.
pub fn fetch_status_drift(conn: &Connection) -> Result<Vec<Copy>> {
    query_copies(
        conn,
        "SELECT c.id, c.book_id, c.copy_number, c.status
         FROM copies c
         WHERE (c.status = 'Borrowed') <> EXISTS(
             SELECT 1 FROM borrowings b WHERE b.copy_id = c.id AND b.return_date IS NULL
         )
         ORDER BY c.id",
        [],
    )
}

/// Change a copy's number. Status is deliberately not editable here; only the
/// circulation workflow moves it.
pub fn renumber_copy(conn: &Connection, id: i64, copy_number: i64) -> Result<()> {
    if copy_number < 1 {
        return Err(LibraryError::invalid(format!(
            "Copy number must be positive, got {copy_number}."
        )));
    }
    let updated = conn
        .execute(
            "UPDATE copies SET copy_number = ?1 WHERE id = ?2",
            params![copy_number, id],
        )
        .map_err(|err| {
            LibraryError::from_constraint(err, || {
                format!("Copy number {copy_number} is already taken for this book.")
            })
        })?;

    if updated == 0 {
        Err(LibraryError::not_found(format!("Copy {id}")))
    } else {
        Ok(())
    }
}

/// Delete a copy that has never been borrowed.
pub fn delete_copy(conn: &Connection, id: i64) -> Result<()> {
    let tx = write_transaction(conn)?;
    integrity::ensure_copy_deletable(&tx, id)?;
    tx.execute("DELETE FROM copies WHERE id = ?1", [id])?;
    tx.commit()?;
    info!(copy_id = id, "deleted copy");
    Ok(())
}
