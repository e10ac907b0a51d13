use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{LibraryError, Result};
use crate::integrity;
use crate::models::{validate_email, NewUser, User};

use super::write_transaction;

const USER_COLUMNS: &str = "id, name, email, phone, address";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
    })
}

fn duplicate_email(email: &str) -> impl FnOnce() -> String + '_ {
    move || format!("A user with email {email} already exists.")
}

/// Every user, alphabetically.
pub fn fetch_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY name COLLATE NOCASE, id"
    ))?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn find_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            row_to_user,
        )
        .optional()?)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            [email.trim()],
            row_to_user,
        )
        .optional()?)
}

/// Insert a user after validating the email. A taken email is a conflict.
pub fn create_user(conn: &Connection, new: &NewUser) -> Result<User> {
    new.validate()?;
    let email = new.email.trim();
    conn.execute(
        "INSERT INTO users (name, email, phone, address) VALUES (?1, ?2, ?3, ?4)",
        params![new.name.trim(), email, new.phone, new.address],
    )
    .map_err(|err| LibraryError::from_constraint(err, duplicate_email(email)))?;

    Ok(User {
        id: conn.last_insert_rowid(),
        name: new.name.trim().to_string(),
        email: email.to_string(),
        phone: new.phone.clone(),
        address: new.address.clone(),
    })
}

pub fn update_user(conn: &Connection, user: &User) -> Result<()> {
    if user.name.trim().is_empty() {
        return Err(LibraryError::invalid("Name is required."));
    }
    validate_email(&user.email)?;
    let updated = conn
        .execute(
            "UPDATE users SET name = ?1, email = ?2, phone = ?3, address = ?4 WHERE id = ?5",
            params![user.name, user.email, user.phone, user.address, user.id],
        )
        .map_err(|err| LibraryError::from_constraint(err, duplicate_email(&user.email)))?;

    if updated == 0 {
        Err(LibraryError::not_found(format!("User {}", user.id)))
    } else {
        Ok(())
    }
}

/// Delete a user with no borrowing history and no librarian role.
pub fn delete_user(conn: &Connection, id: i64) -> Result<()> {
    let tx = write_transaction(conn)?;
    integrity::ensure_user_deletable(&tx, id)?;
    tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
    tx.commit()?;
    info!(user_id = id, "deleted user");
    Ok(())
}

pub fn is_librarian(conn: &Connection, user_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM librarians WHERE user_id = ?1)",
        [user_id],
        |row| row.get(0),
    )?)
}
