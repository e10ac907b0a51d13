//! Borrow and return. Each operation is one immediate transaction: SQLite's
//! write lock is taken before the availability check, so two callers racing
//! for the same copy are serialized and the second one sees the first one's
//! open borrowing. The partial unique index on open borrowings backs this up
//! at the storage level.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::db::{find_borrowing_by_id, find_copy_by_id, find_user_by_id, write_transaction};
use crate::error::{LibraryError, Result};
use crate::models::{Borrowing, CopyStatus};

fn open_borrowings_for_copy(conn: &Connection, copy_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM borrowings WHERE copy_id = ?1 AND return_date IS NULL",
        [copy_id],
        |row| row.get(0),
    )?)
}

fn set_copy_status(conn: &Connection, copy_id: i64, status: CopyStatus) -> Result<()> {
    conn.execute(
        "UPDATE copies SET status = ?1 WHERE id = ?2",
        params![status, copy_id],
    )?;
    Ok(())
}

/// Lend `copy_id` to `user_id` starting on `borrow_date`.
///
/// The stored copy status and the open-borrowing count are both read; the
/// count decides. A copy marked `Borrowed` with no open borrowing behind it
/// is treated as available and its status is repaired by this borrow.
///
/// # Errors
///
/// * `InvalidArgument` when `borrow_date` is `None`.
/// * `NotFound` when the user or the copy does not exist.
/// * `Conflict` when the copy already has an open borrowing.
pub fn borrow(
    conn: &Connection,
    user_id: i64,
    copy_id: i64,
    borrow_date: Option<NaiveDate>,
) -> Result<Borrowing> {
    let borrow_date =
        borrow_date.ok_or_else(|| LibraryError::invalid("Borrow date cannot be null."))?;

    let tx = write_transaction(conn)?;
    if find_user_by_id(&tx, user_id)?.is_none() {
        return Err(LibraryError::not_found(format!("User {user_id}")));
    }
    let copy = find_copy_by_id(&tx, copy_id)?
        .ok_or_else(|| LibraryError::not_found(format!("Copy {copy_id}")))?;

    let current = CopyStatus::from_open_borrowings(open_borrowings_for_copy(&tx, copy_id)?);
    if current != copy.status {
        warn!(
            copy_id,
            stored = %copy.status,
            derived = %current,
            "copy status drifted from borrowing records"
        );
    }
    let next = current.transition_to(CopyStatus::Borrowed)?;

    tx.execute(
        "INSERT INTO borrowings (user_id, copy_id, borrow_date, return_date)
         VALUES (?1, ?2, ?3, NULL)",
        params![user_id, copy_id, borrow_date],
    )
    .map_err(|err| {
        LibraryError::from_constraint(err, || "The book copy is already borrowed.".to_string())
    })?;
    let id = tx.last_insert_rowid();
    set_copy_status(&tx, copy_id, next)?;
    tx.commit()?;

    info!(borrowing_id = id, user_id, copy_id, %borrow_date, "copy borrowed");
    Ok(Borrowing {
        id,
        user_id,
        copy_id,
        borrow_date,
        return_date: None,
    })
}

/// Close borrowing `borrowing_id` on `return_date` and put its copy back on
/// the shelf.
///
/// # Errors
///
/// * `NotFound` when the borrowing does not exist.
/// * `Conflict` when it was already returned.
/// * `InvalidArgument` when `return_date` is before the borrow date.
pub fn return_copy(
    conn: &Connection,
    borrowing_id: i64,
    return_date: NaiveDate,
) -> Result<Borrowing> {
    let tx = write_transaction(conn)?;
    let mut borrowing = find_borrowing_by_id(&tx, borrowing_id)?
        .ok_or_else(|| LibraryError::not_found(format!("Borrowing {borrowing_id}")))?;

    if let Some(returned) = borrowing.return_date {
        return Err(LibraryError::conflict(format!(
            "Borrowing {borrowing_id} was already returned on {returned}."
        )));
    }
    if return_date < borrowing.borrow_date {
        return Err(LibraryError::invalid(
            "Return date cannot be earlier than borrow date.",
        ));
    }

    // An open borrowing exists, so the copy is out by definition.
    let next = CopyStatus::Borrowed.transition_to(CopyStatus::Available)?;
    if let Some(copy) = find_copy_by_id(&tx, borrowing.copy_id)? {
        if copy.status != CopyStatus::Borrowed {
            warn!(
                copy_id = copy.id,
                stored = %copy.status,
                "returning a copy that was not marked borrowed"
            );
        }
    }

    let updated = tx.execute(
        "UPDATE borrowings SET return_date = ?1 WHERE id = ?2 AND return_date IS NULL",
        params![return_date, borrowing_id],
    )?;
    if updated == 0 {
        return Err(LibraryError::conflict(format!(
            "Borrowing {borrowing_id} was already returned."
        )));
    }
    set_copy_status(&tx, borrowing.copy_id, next)?;
    tx.commit()?;

    info!(borrowing_id, copy_id = borrowing.copy_id, %return_date, "copy returned");
    borrowing.return_date = Some(return_date);
    Ok(borrowing)
}
