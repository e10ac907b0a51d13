use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// How long a connection waits on another writer's lock before giving up.
/// Borrow and return take the write lock up front, so a concurrent caller
/// queues here instead of failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the database file at `path`, configure the connection and
/// run lazy migrations.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // WAL lets readers keep going while a borrow holds the write lock.
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    configure(&conn)?;
    debug!(path = %path.display(), journal_mode = %mode, "opened library database");
    Ok(conn)
}

/// Private in-memory database, used by tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    ensure_schema(conn)
}

/// Create every table and index if missing. Foreign keys are `RESTRICT`:
/// dependent rows are handled by explicit rules in [`crate::integrity`], never
/// by the schema.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            address TEXT
        );

        CREATE TABLE IF NOT EXISTS librarians (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL UNIQUE,
            employment_date TEXT NOT NULL,
            position TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS publishers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT,
            phone TEXT
        );

        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            publication_year INTEGER NOT NULL,
            isbn TEXT NOT NULL UNIQUE,
            publisher_id INTEGER NOT NULL,
            FOREIGN KEY(publisher_id) REFERENCES publishers(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS copies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            copy_number INTEGER NOT NULL CHECK (copy_number > 0),
            status TEXT NOT NULL CHECK (status IN ('Available', 'Borrowed')),
            UNIQUE (book_id, copy_number),
            FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS borrowings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            copy_id INTEGER NOT NULL,
            borrow_date TEXT NOT NULL,
            return_date TEXT,
            CHECK (return_date IS NULL OR return_date >= borrow_date),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE RESTRICT,
            FOREIGN KEY(copy_id) REFERENCES copies(id) ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_books_publisher ON books(publisher_id);
        CREATE INDEX IF NOT EXISTS idx_copies_status ON copies(status);
        CREATE INDEX IF NOT EXISTS idx_borrowings_user ON borrowings(user_id);

        -- At most one open borrowing per copy.
        CREATE UNIQUE INDEX IF NOT EXISTS ux_borrowings_open_copy
            ON borrowings(copy_id) WHERE return_date IS NULL;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let tables = table_names(&conn);
        for expected in ["books", "borrowings", "copies", "librarians", "publishers", "users"] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = open_in_memory().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn opens_file_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("library.sqlite");
        let conn = open_database(&path).unwrap();
        assert!(path.exists());
        drop(conn);
    }
}
