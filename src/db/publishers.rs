use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{LibraryError, Result};
use crate::integrity;
use crate::models::{NewPublisher, Publisher};

use super::write_transaction;

fn row_to_publisher(row: &Row<'_>) -> rusqlite::Result<Publisher> {
    Ok(Publisher {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
    })
}

/// Retrieve every publisher sorted by name.
pub fn fetch_publishers(conn: &Connection) -> Result<Vec<Publisher>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, address, phone FROM publishers ORDER BY name COLLATE NOCASE, id",
    )?;
    let publishers = stmt
        .query_map([], row_to_publisher)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(publishers)
}

pub fn find_publisher_by_id(conn: &Connection, id: i64) -> Result<Option<Publisher>> {
    Ok(conn
        .query_row(
            "SELECT id, name, address, phone FROM publishers WHERE id = ?1",
            [id],
            row_to_publisher,
        )
        .optional()?)
}

/// Look a publisher up by exact name. Names are not unique in the schema, so
/// an ambiguous name is reported as a conflict rather than picking one.
pub fn find_publisher_by_name(conn: &Connection, name: &str) -> Result<Option<Publisher>> {
    let mut stmt =
        conn.prepare("SELECT id, name, address, phone FROM publishers WHERE name = ?1 LIMIT 2")?;
    let mut matches = stmt
        .query_map([name], row_to_publisher)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if matches.len() > 1 {
        return Err(LibraryError::conflict(format!(
            "Multiple publishers found with the name: {name}"
        )));
    }
    Ok(matches.pop())
}

/// Insert a new publisher, returning the hydrated row.
pub fn create_publisher(conn: &Connection, new: &NewPublisher) -> Result<Publisher> {
    new.validate()?;
    conn.execute(
        "INSERT INTO publishers (name, address, phone) VALUES (?1, ?2, ?3)",
        params![new.name.trim(), new.address, new.phone],
    )?;

    Ok(Publisher {
        id: conn.last_insert_rowid(),
        name: new.name.trim().to_string(),
        address: new.address.clone(),
        phone: new.phone.clone(),
    })
}

/// Replace every editable field. Books pick the new name up on their next
/// read since the name is joined, not copied.
pub fn update_publisher(conn: &Connection, publisher: &Publisher) -> Result<()> {
    if publisher.name.trim().is_empty() {
        return Err(LibraryError::invalid("Publisher name is required."));
    }
    let updated = conn.execute(
        "UPDATE publishers SET name = ?1, address = ?2, phone = ?3 WHERE id = ?4",
        params![
            publisher.name.trim(),
            publisher.address,
            publisher.phone,
            publisher.id
        ],
    )?;

    if updated == 0 {
        Err(LibraryError::not_found(format!("Publisher {}", publisher.id)))
    } else {
        Ok(())
    }
}

/// Delete a publisher that owns no books.
pub fn delete_publisher(conn: &Connection, id: i64) -> Result<()> {
    let tx = write_transaction(conn)?;
    integrity::ensure_publisher_deletable(&tx, id)?;
    tx.execute("DELETE FROM publishers WHERE id = ?1", [id])?;
    tx.commit()?;
    info!(publisher_id = id, "deleted publisher");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::error::ErrorKind;

    fn new_publisher(name: &str) -> NewPublisher {
        NewPublisher {
            name: name.to_string(),
            address: Some("1 Main St".to_string()),
            phone: None,
        }
    }

    #[test]
    fn create_and_find() {
        let conn = open_in_memory().unwrap();
        let created = create_publisher(&conn, &new_publisher("Penguin")).unwrap();

        let by_id = find_publisher_by_id(&conn, created.id).unwrap().unwrap();
        assert_eq!(by_id, created);
        let by_name = find_publisher_by_name(&conn, "Penguin").unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert!(find_publisher_by_name(&conn, "Nobody").unwrap().is_none());
    }

    #[test]
    fn ambiguous_name_conflicts() {
        let conn = open_in_memory().unwrap();
        create_publisher(&conn, &new_publisher("Twin")).unwrap();
        create_publisher(&conn, &new_publisher("Twin")).unwrap();

        let err = find_publisher_by_name(&conn, "Twin").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn blank_name_is_rejected() {
        let conn = open_in_memory().unwrap();
        let err = create_publisher(&conn, &new_publisher("   ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn update_missing_publisher_is_not_found() {
        let conn = open_in_memory().unwrap();
        let ghost = Publisher {
            id: 42,
            name: "Ghost".to_string(),
            address: None,
            phone: None,
        };
        assert_eq!(
            update_publisher(&conn, &ghost).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn delete_empty_publisher() {
        let conn = open_in_memory().unwrap();
        let publisher = create_publisher(&conn, &new_publisher("Gone")).unwrap();
        delete_publisher(&conn, publisher.id).unwrap();
        assert!(fetch_publishers(&conn).unwrap().is_empty());
        assert_eq!(
            delete_publisher(&conn, publisher.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
