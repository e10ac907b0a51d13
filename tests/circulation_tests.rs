//! End-to-end lending scenarios through the public API.

mod common;

use chrono::NaiveDate;
use library_manager::db::{
    fetch_borrowings_for_user, fetch_open_borrowings, fetch_status_drift, find_copy_by_id,
    find_open_borrowing_by_title, open_in_memory,
};
use library_manager::{borrow, return_copy, CopyStatus, ErrorKind};

use common::{seed_catalogue, seed_user};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

#[test]
fn test_borrow_conflict_then_return() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    let u = seed_user(&conn, "Genly");
    let v = seed_user(&conn, "Estraven");

    let borrowing = borrow(&conn, u.id, catalogue.copy.id, Some(day(1))).unwrap();
    assert!(borrowing.is_open());
    assert_eq!(
        find_copy_by_id(&conn, catalogue.copy.id).unwrap().unwrap().status,
        CopyStatus::Borrowed
    );

    let err = borrow(&conn, v.id, catalogue.copy.id, Some(day(2))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "Conflict: The book copy is already borrowed.");

    let returned = return_copy(&conn, borrowing.id, day(10)).unwrap();
    assert_eq!(returned.return_date, Some(day(10)));
    assert_eq!(
        find_copy_by_id(&conn, catalogue.copy.id).unwrap().unwrap().status,
        CopyStatus::Available
    );

    // V can have it now.
    borrow(&conn, v.id, catalogue.copy.id, Some(day(11))).unwrap();
    assert_eq!(fetch_borrowings_for_user(&conn, u.id).unwrap().len(), 1);
    assert_eq!(fetch_open_borrowings(&conn).unwrap().len(), 1);
    assert!(fetch_status_drift(&conn).unwrap().is_empty());
}

#[test]
fn test_return_twice_is_conflict() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    let u = seed_user(&conn, "Genly");

    let borrowing = borrow(&conn, u.id, catalogue.copy.id, Some(day(1))).unwrap();
    return_copy(&conn, borrowing.id, day(2)).unwrap();
    let err = return_copy(&conn, borrowing.id, day(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(fetch_status_drift(&conn).unwrap().is_empty());
}

#[test]
fn test_return_before_borrow_date_is_rejected() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    let u = seed_user(&conn, "Genly");

    let borrowing = borrow(&conn, u.id, catalogue.copy.id, Some(day(5))).unwrap();
    let err = return_copy(&conn, borrowing.id, day(4)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Nothing changed: still out, still open.
    assert_eq!(
        find_copy_by_id(&conn, catalogue.copy.id).unwrap().unwrap().status,
        CopyStatus::Borrowed
    );
    assert_eq!(fetch_open_borrowings(&conn).unwrap().len(), 1);
}

#[test]
fn test_borrow_requires_a_date() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    let u = seed_user(&conn, "Genly");

    let err = borrow(&conn, u.id, catalogue.copy.id, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(fetch_open_borrowings(&conn).unwrap().is_empty());
}

#[test]
fn test_unknown_ids_are_not_found() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    let u = seed_user(&conn, "Genly");

    assert_eq!(
        borrow(&conn, u.id + 100, catalogue.copy.id, Some(day(1)))
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        borrow(&conn, u.id, catalogue.copy.id + 100, Some(day(1)))
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        return_copy(&conn, 999, day(1)).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_open_borrowing_lookup_by_title() {
    let conn = open_in_memory().unwrap();
    let catalogue = seed_catalogue(&conn);
    let u = seed_user(&conn, "Genly");

    assert!(find_open_borrowing_by_title(&conn, u.id, &catalogue.book.title)
        .unwrap()
        .is_none());
    let borrowing = borrow(&conn, u.id, catalogue.copy.id, Some(day(1))).unwrap();
    let found = find_open_borrowing_by_title(&conn, u.id, &catalogue.book.title)
        .unwrap()
        .unwrap();
    assert_eq!(found.id, borrowing.id);
}
