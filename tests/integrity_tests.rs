//! Delete guards and uniqueness rules seen from outside the crate.

mod common;

use chrono::NaiveDate;
use library_manager::db::{
    create_book, create_librarian, create_user, delete_book, delete_borrowing, delete_copy,
    delete_librarian, delete_publisher, delete_user, fetch_books, find_copy_by_id,
    is_librarian, open_in_memory, update_publisher,
};
use library_manager::models::{NewBook, NewLibrarian, NewUser};
use library_manager::{borrow, return_copy, ErrorKind};

use common::{seed_catalogue, seed_user};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
}

#[test]
fn test_delete_chain_is_blocked_until_dependents_go() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    let user = seed_user(&conn, "Genly");
    let borrowing = borrow(&conn, user.id, catalogue.copy.id, Some(day(1))).unwrap();

    let kind = |result: library_manager::Result<()>| result.unwrap_err().kind();
    assert_eq!(kind(delete_publisher(&conn, catalogue.publisher.id)), ErrorKind::Conflict);
    assert_eq!(kind(delete_book(&conn, catalogue.book.id)), ErrorKind::Conflict);
    assert_eq!(kind(delete_copy(&conn, catalogue.copy.id)), ErrorKind::Conflict);
    assert_eq!(kind(delete_borrowing(&conn, borrowing.id)), ErrorKind::Conflict);
    assert_eq!(kind(delete_user(&conn, user.id)), ErrorKind::Conflict);

    // Once returned the history row can go, then everything above it.
    return_copy(&conn, borrowing.id, day(3)).unwrap();
    delete_borrowing(&conn, borrowing.id).unwrap();
    delete_user(&conn, user.id).unwrap();
    delete_copy(&conn, catalogue.copy.id).unwrap();
    delete_book(&conn, catalogue.book.id).unwrap();
    delete_publisher(&conn, catalogue.publisher.id).unwrap();

    assert!(find_copy_by_id(&conn, catalogue.copy.id).unwrap().is_none());
    assert_eq!(
        delete_publisher(&conn, catalogue.publisher.id)
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_librarian_role_blocks_user_delete_until_removed() {
    let conn = open_in_memory().unwrap();
    let user = seed_user(&conn, "Argaven");
    let librarian = create_librarian(
        &conn,
        &NewLibrarian {
            user_id: user.id,
            employment_date: day(1),
            position: "Archivist".to_string(),
        },
    )
    .unwrap();
    assert!(is_librarian(&conn, user.id).unwrap());
    assert_eq!(
        delete_user(&conn, user.id).unwrap_err().kind(),
        ErrorKind::Conflict
    );

    delete_librarian(&conn, librarian.id).unwrap();
    assert!(!is_librarian(&conn, user.id).unwrap());
    delete_user(&conn, user.id).unwrap();
}

#[test]
fn test_duplicates_are_conflicts() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    seed_user(&conn, "Genly");

    let err = create_user(
        &conn,
        &NewUser {
            name: "Another Genly".to_string(),
            email: "genly@example.org".to_string(),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = create_book(
        &conn,
        &NewBook {
            title: "Same ISBN".to_string(),
            author: "Someone".to_string(),
            publication_year: 2001,
            isbn: catalogue.book.isbn.clone(),
            publisher_id: catalogue.publisher.id,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_publisher_rename_shows_on_books() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);

    let mut publisher = catalogue.publisher.clone();
    publisher.name = "Penguin Classics".to_string();
    update_publisher(&conn, &publisher).unwrap();

    let books = fetch_books(&conn).unwrap();
    assert_eq!(books[0].publisher_name, "Penguin Classics");
}
