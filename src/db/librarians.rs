use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{LibraryError, Result};
use crate::integrity;
use crate::models::{Librarian, NewLibrarian};

use super::write_transaction;

fn row_to_librarian(row: &Row<'_>) -> rusqlite::Result<Librarian> {
    Ok(Librarian {
        id: row.get(0)?,
        user_id: row.get(1)?,
        employment_date: row.get(2)?,
        position: row.get(3)?,
    })
}

pub fn fetch_librarians(conn: &Connection) -> Result<Vec<Librarian>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, employment_date, position FROM librarians ORDER BY id",
    )?;
    let librarians = stmt
        .query_map([], row_to_librarian)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(librarians)
}

pub fn find_librarian_by_id(conn: &Connection, id: i64) -> Result<Option<Librarian>> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, employment_date, position FROM librarians WHERE id = ?1",
            [id],
            row_to_librarian,
        )
        .optional()?)
}

pub fn find_librarian_for_user(conn: &Connection, user_id: i64) -> Result<Option<Librarian>> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, employment_date, position FROM librarians WHERE user_id = ?1",
            [user_id],
            row_to_librarian,
        )
        .optional()?)
}

/// Grant the librarian role to an existing user. A user holds the role at
/// most once.
pub fn create_librarian(conn: &Connection, new: &NewLibrarian) -> Result<Librarian> {
    new.validate()?;
    let tx = write_transaction(conn)?;
    let user_exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        [new.user_id],
        |row| row.get(0),
    )?;
    if !user_exists {
        return Err(LibraryError::not_found(format!("User {}", new.user_id)));
    }

    tx.execute(
        "INSERT INTO librarians (user_id, employment_date, position) VALUES (?1, ?2, ?3)",
        params![new.user_id, new.employment_date, new.position.trim()],
    )
    .map_err(|err| {
        LibraryError::from_constraint(err, || {
            format!("User {} is already a librarian.", new.user_id)
        })
    })?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(Librarian {
        id,
        user_id: new.user_id,
        employment_date: new.employment_date,
        position: new.position.trim().to_string(),
    })
}

/// Update employment details. The owning user cannot be reassigned.
pub fn update_librarian(conn: &Connection, librarian: &Librarian) -> Result<()> {
    if librarian.position.trim().is_empty() {
        return Err(LibraryError::invalid("Position is required."));
    }
    let updated = conn.execute(
        "UPDATE librarians SET employment_date = ?1, position = ?2 WHERE id = ?3",
        params![librarian.employment_date, librarian.position, librarian.id],
    )?;

    if updated == 0 {
        Err(LibraryError::not_found(format!("Librarian {}", librarian.id)))
    } else {
        Ok(())
    }
}

/// Remove the librarian role. The role link lives only on the librarian row,
/// so deleting it inside the transaction clears the user's role while the user
/// row itself stays.
pub fn delete_librarian(conn: &Connection, id: i64) -> Result<()> {
    let tx = write_transaction(conn)?;
    integrity::ensure_librarian_deletable(&tx, id)?;
    tx.execute("DELETE FROM librarians WHERE id = ?1", [id])?;
    tx.commit()?;
    info!(librarian_id = id, "removed librarian role");
    Ok(())
}
