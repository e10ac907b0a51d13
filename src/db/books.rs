use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{LibraryError, Result};
use crate::integrity;
use crate::models::{validate_isbn, Book, Copy, NewBook, NewCopy};

use super::copies::insert_copy;
use super::write_transaction;

/// Books always come back with the publisher name joined in.
const BOOK_SELECT: &str = "SELECT b.id, b.title, b.author, b.publication_year, b.isbn,
                                  b.publisher_id, p.name
                           FROM books b
                           INNER JOIN publishers p ON p.id = b.publisher_id";

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        publication_year: row.get(3)?,
        isbn: row.get(4)?,
        publisher_id: row.get(5)?,
        publisher_name: row.get(6)?,
    })
}

fn require_publisher(conn: &Connection, publisher_id: i64) -> Result<String> {
    conn.query_row(
        "SELECT name FROM publishers WHERE id = ?1",
        [publisher_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| LibraryError::not_found(format!("Publisher {publisher_id}")))
}

fn duplicate_isbn(isbn: &str) -> impl FnOnce() -> String + '_ {
    move || format!("A book with ISBN {isbn} already exists.")
}

/// Every book ordered by title, case-insensitively.
pub fn fetch_books(conn: &Connection) -> Result<Vec<Book>> {
    let mut stmt = conn.prepare(&format!(
        "{BOOK_SELECT} ORDER BY b.title COLLATE NOCASE, b.id"
    ))?;
    let books = stmt
        .query_map([], row_to_book)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(books)
}

pub fn find_book_by_id(conn: &Connection, id: i64) -> Result<Option<Book>> {
    Ok(conn
        .query_row(&format!("{BOOK_SELECT} WHERE b.id = ?1"), [id], row_to_book)
        .optional()?)
}

pub fn find_book_by_isbn(conn: &Connection, isbn: &str) -> Result<Option<Book>> {
    Ok(conn
        .query_row(&format!("{BOOK_SELECT} WHERE b.isbn = ?1"), [isbn], row_to_book)
        .optional()?)
}

fn insert_book(conn: &Connection, new: &NewBook) -> Result<Book> {
    new.validate()?;
    let publisher_name = require_publisher(conn, new.publisher_id)?;
    conn.execute(
        "INSERT INTO books (title, author, publication_year, isbn, publisher_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.title.trim(),
            new.author.trim(),
            new.publication_year,
            new.isbn,
            new.publisher_id
        ],
    )
    .map_err(|err| LibraryError::from_constraint(err, duplicate_isbn(&new.isbn)))?;

    Ok(Book {
        id: conn.last_insert_rowid(),
        title: new.title.trim().to_string(),
        author: new.author.trim().to_string(),
        publication_year: new.publication_year,
        isbn: new.isbn.clone(),
        publisher_id: new.publisher_id,
        publisher_name,
    })
}

/// Insert a book under an existing publisher.
pub fn create_book(conn: &Connection, new: &NewBook) -> Result<Book> {
    let tx = write_transaction(conn)?;
    let book = insert_book(&tx, new)?;
    tx.commit()?;
    info!(book_id = book.id, isbn = %book.isbn, "created book");
    Ok(book)
}

/// Insert a book together with `copies` available copies numbered from 1. The
/// whole batch commits or none of it does.
pub fn create_book_with_copies(
    conn: &Connection,
    new: &NewBook,
    copies: u32,
) -> Result<(Book, Vec<Copy>)> {
    let tx = write_transaction(conn)?;
    let book = insert_book(&tx, new)?;
    let created = (1..=i64::from(copies))
        .map(|number| insert_copy(&tx, &NewCopy::available(book.id, number)))
        .collect::<Result<Vec<_>>>()?;
    tx.commit()?;

    info!(
        book_id = book.id,
        copies = created.len(),
        "created book with copies"
    );
    Ok((book, created))
}

/// Replace the editable fields of a book, including its publisher.
pub fn update_book(conn: &Connection, book: &Book) -> Result<()> {
    if book.title.trim().is_empty() || book.author.trim().is_empty() {
        return Err(LibraryError::invalid("Title and author are required."));
    }
    validate_isbn(&book.isbn)?;

    let tx = write_transaction(conn)?;
    require_publisher(&tx, book.publisher_id)?;
    let updated = tx
        .execute(
            "UPDATE books
             SET title = ?1, author = ?2, publication_year = ?3, isbn = ?4, publisher_id = ?5
             WHERE id = ?6",
            params![
                book.title,
                book.author,
                book.publication_year,
                book.isbn,
                book.publisher_id,
                book.id
            ],
        )
        .map_err(|err| LibraryError::from_constraint(err, duplicate_isbn(&book.isbn)))?;

    if updated == 0 {
        return Err(LibraryError::not_found(format!("Book {}", book.id)));
    }
    tx.commit()?;
    Ok(())
}

/// Delete a book that owns no copies.
pub fn delete_book(conn: &Connection, id: i64) -> Result<()> {
    let tx = write_transaction(conn)?;
    integrity::ensure_book_deletable(&tx, id)?;
    tx.execute("DELETE FROM books WHERE id = ?1", [id])?;
    tx.commit()?;
    info!(book_id = id, "deleted book");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        create_copy, create_publisher, delete_publisher, fetch_copies_for_book, open_in_memory,
        update_publisher,
    };
    use crate::error::ErrorKind;
    use crate::models::{CopyStatus, NewPublisher};

    fn setup() -> (Connection, i64) {
        let conn = open_in_memory().unwrap();
        let publisher = create_publisher(
            &conn,
            &NewPublisher {
                name: "Vintage".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        (conn, publisher.id)
    }

    fn new_book(publisher_id: i64, isbn: &str) -> NewBook {
        NewBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            publication_year: 1965,
            isbn: isbn.to_string(),
            publisher_id,
        }
    }

    #[test]
    fn create_joins_publisher_name() {
        let (conn, publisher_id) = setup();
        let book = create_book(&conn, &new_book(publisher_id, "9780441013593")).unwrap();
        assert_eq!(book.publisher_name, "Vintage");
        assert_eq!(find_book_by_id(&conn, book.id).unwrap(), Some(book.clone()));
        assert_eq!(
            find_book_by_isbn(&conn, "9780441013593").unwrap(),
            Some(book)
        );
    }

    #[test]
    fn publisher_rename_is_visible_on_books() {
        let (conn, publisher_id) = setup();
        let book = create_book(&conn, &new_book(publisher_id, "9780441013593")).unwrap();
        let mut publisher = crate::db::find_publisher_by_id(&conn, publisher_id)
            .unwrap()
            .unwrap();
        publisher.name = "Vintage Classics".to_string();
        update_publisher(&conn, &publisher).unwrap();

        let reloaded = find_book_by_id(&conn, book.id).unwrap().unwrap();
        assert_eq!(reloaded.publisher_name, "Vintage Classics");
    }

    #[test]
    fn duplicate_isbn_conflicts() {
        let (conn, publisher_id) = setup();
        create_book(&conn, &new_book(publisher_id, "9780441013593")).unwrap();
        let err = create_book(&conn, &new_book(publisher_id, "9780441013593")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn malformed_isbn_and_unknown_publisher() {
        let (conn, publisher_id) = setup();
        let err = create_book(&conn, &new_book(publisher_id, "12345")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = create_book(&conn, &new_book(publisher_id + 1, "9780441013593")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(fetch_books(&conn).unwrap().is_empty());
    }

    #[test]
    fn book_with_copies_is_created_atomically() {
        let (conn, publisher_id) = setup();
        let (book, copies) =
            create_book_with_copies(&conn, &new_book(publisher_id, "9780441013593"), 3).unwrap();
        let numbers: Vec<i64> = copies.iter().map(|c| c.copy_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(copies.iter().all(|c| c.status == CopyStatus::Available));

        // Same ISBN again: nothing from the second attempt survives.
        let err = create_book_with_copies(&conn, &new_book(publisher_id, "9780441013593"), 2)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fetch_books(&conn).unwrap().len(), 1);
        assert_eq!(fetch_copies_for_book(&conn, book.id).unwrap().len(), 3);
    }

    #[test]
    fn delete_guarded_by_copies() {
        let (conn, publisher_id) = setup();
        let book = create_book(&conn, &new_book(publisher_id, "9780441013593")).unwrap();
        create_copy(&conn, &NewCopy::available(book.id, 1)).unwrap();

        assert_eq!(
            delete_book(&conn, book.id).unwrap_err().kind(),
            ErrorKind::Conflict
        );
        assert!(find_book_by_id(&conn, book.id).unwrap().is_some());
        assert_eq!(
            delete_publisher(&conn, publisher_id).unwrap_err().kind(),
            ErrorKind::Conflict
        );

        let empty = create_book(&conn, &new_book(publisher_id, "0306406152")).unwrap();
        delete_book(&conn, empty.id).unwrap();
        assert!(find_book_by_id(&conn, empty.id).unwrap().is_none());
    }

    #[test]
    fn update_book_fields() {
        let (conn, publisher_id) = setup();
        let mut book = create_book(&conn, &new_book(publisher_id, "9780441013593")).unwrap();
        book.title = "Dune Messiah".to_string();
        book.publication_year = 1969;
        update_book(&conn, &book).unwrap();
        assert_eq!(find_book_by_id(&conn, book.id).unwrap(), Some(book));
    }
}
