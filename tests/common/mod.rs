//! Catalogue fixtures shared by the integration tests.

use library_manager::db::{create_book_with_copies, create_publisher, create_user};
use library_manager::models::{Book, Copy, NewBook, NewPublisher, NewUser, Publisher, User};
use rusqlite::Connection;

/// Publisher P, book B (ISBN X) and its single copy C1.
#[allow(dead_code)]
pub struct Catalogue {
    pub publisher: Publisher,
    pub book: Book,
    pub copy: Copy,
}

pub fn seed_catalogue(conn: &Connection) -> Catalogue {
    let publisher = create_publisher(
        conn,
        &NewPublisher {
            name: "Penguin".to_string(),
            address: Some("80 Strand, London".to_string()),
            ..Default::default()
        },
    )
    .expect("publisher");
    let (book, mut copies) = create_book_with_copies(
        conn,
        &NewBook {
            title: "The Left Hand of Darkness".to_string(),
            author: "Ursula K. Le Guin".to_string(),
            publication_year: 1969,
            isbn: "9780441478125".to_string(),
            publisher_id: publisher.id,
        },
        1,
    )
    .expect("book with copy");
    let copy = copies.remove(0);
    Catalogue {
        publisher,
        book,
        copy,
    }
}

#[allow(dead_code)]
pub fn seed_user(conn: &Connection, name: &str) -> User {
    create_user(
        conn,
        &NewUser {
            name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase()),
            ..Default::default()
        },
    )
    .expect("user")
}
