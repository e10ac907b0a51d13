use rusqlite::Connection;

use crate::db::{fetch_books, fetch_borrowing_details, fetch_copy_details, fetch_publishers, fetch_users};
use crate::error::Result;
use crate::models::{Book, BorrowingDetail, CopyDetail, Publisher, User};

/// Top-level tabs, in the order `Tab` cycles through them.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Tab {
    Copies,
    Borrowings,
    Books,
    Users,
    Publishers,
}

impl Tab {
    pub(crate) const ALL: [Tab; 5] = [
        Tab::Copies,
        Tab::Borrowings,
        Tab::Books,
        Tab::Users,
        Tab::Publishers,
    ];

    pub(crate) fn title(self) -> &'static str {
        match self {
            Tab::Copies => "Copies",
            Tab::Borrowings => "Borrowings",
            Tab::Books => "Books",
            Tab::Users => "Users",
            Tab::Publishers => "Publishers",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    pub(crate) fn next(self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub(crate) fn previous(self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Rows shown by each tab, reloaded from the database after every change.
#[derive(Default)]
pub(crate) struct Listings {
    pub(crate) copies: Vec<CopyDetail>,
    pub(crate) borrowings: Vec<BorrowingDetail>,
    pub(crate) books: Vec<Book>,
    pub(crate) users: Vec<User>,
    pub(crate) publishers: Vec<Publisher>,
}

impl Listings {
    pub(crate) fn load(conn: &Connection, open_only: bool) -> Result<Self> {
        Ok(Self {
            copies: fetch_copy_details(conn)?,
            borrowings: fetch_borrowing_details(conn, open_only)?,
            books: fetch_books(conn)?,
            users: fetch_users(conn)?,
            publishers: fetch_publishers(conn)?,
        })
    }

    pub(crate) fn len(&self, tab: Tab) -> usize {
        match tab {
            Tab::Copies => self.copies.len(),
            Tab::Borrowings => self.borrowings.len(),
            Tab::Books => self.books.len(),
            Tab::Users => self.users.len(),
            Tab::Publishers => self.publishers.len(),
        }
    }

    /// One display string per row of `tab`.
    pub(crate) fn rows(&self, tab: Tab) -> Vec<String> {
        match tab {
            Tab::Copies => self
                .copies
                .iter()
                .map(|detail| {
                    format!(
                        "{:<40} #{:<3} {:<10} {}",
                        detail.book_title, detail.copy.copy_number, detail.copy.status, detail.isbn
                    )
                })
                .collect(),
            Tab::Borrowings => self
                .borrowings
                .iter()
                .map(|detail| {
                    let returned = detail
                        .borrowing
                        .return_date
                        .map(|date| date.to_string())
                        .unwrap_or_else(|| "open".to_string());
                    format!(
                        "{:<30} #{:<3} {:<24} {} → {}",
                        detail.book_title,
                        detail.copy_number,
                        detail.user_name,
                        detail.borrowing.borrow_date,
                        returned
                    )
                })
                .collect(),
            Tab::Books => self
                .books
                .iter()
                .map(|book| {
                    format!(
                        "{:<40} {:<24} {} {:<14} {}",
                        book.title, book.author, book.publication_year, book.isbn, book.publisher_name
                    )
                })
                .collect(),
            Tab::Users => self
                .users
                .iter()
                .map(|user| {
                    format!(
                        "{:<30} {:<32} {}",
                        user.name,
                        user.email,
                        user.phone.as_deref().unwrap_or("")
                    )
                })
                .collect(),
            Tab::Publishers => self
                .publishers
                .iter()
                .map(|publisher| {
                    format!(
                        "{:<30} {}",
                        publisher.name,
                        publisher.address.as_deref().unwrap_or("")
                    )
                })
                .collect(),
        }
    }
}
