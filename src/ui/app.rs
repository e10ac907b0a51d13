use std::mem;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::circulation::{borrow, return_copy};
use crate::db::{
    create_book_with_copies, create_publisher, create_user, delete_book, delete_borrowing,
    delete_copy, delete_publisher, delete_user, find_publisher_by_name, find_user_by_email,
};
use crate::error::LibraryError;
use crate::models::NewBook;

use super::forms::{ConfirmDelete, DeleteTarget, Form, FormPurpose};
use super::helpers::{centered_rect, surface_error};
use super::screens::{Listings, Tab};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height of the tab bar above the list.
const TAB_BAR_HEIGHT: u16 = 3;

/// Fine-grained modes scoped to the current tab.
enum Mode {
    Normal,
    Editing(Form),
    ConfirmDelete(ConfirmDelete),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    tab: Tab,
    selected: usize,
    listings: Listings,
    open_only: bool,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(conn: Connection) -> Result<Self> {
        let listings = Listings::load(&conn, false)?;
        Ok(Self {
            conn,
            tab: Tab::Copies,
            selected: 0,
            listings,
            open_only: false,
            mode: Mode::Normal,
            status: None,
        })
    }

    /// Feed one key press through the current mode. Returns `true` when the
    /// user asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::Editing(form) => self.handle_form(code, form),
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm),
        };
        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Mode {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Tab | KeyCode::Right => self.switch_tab(self.tab.next()),
            KeyCode::BackTab | KeyCode::Left => self.switch_tab(self.tab.previous()),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Char('g') => match self.reload() {
                Ok(()) => self.set_status("Reloaded.", StatusKind::Info),
                Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
            },
            KeyCode::Char('b') => return self.open_borrow_form(),
            KeyCode::Char('r') => return self.open_return_form(),
            KeyCode::Char('o') if self.tab == Tab::Borrowings => {
                self.open_only = !self.open_only;
                match self.reload() {
                    Ok(()) => {
                        let text = if self.open_only {
                            "Showing open borrowings only."
                        } else {
                            "Showing all borrowings."
                        };
                        self.set_status(text, StatusKind::Info);
                    }
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
            }
            KeyCode::Char('a') => return self.open_add_form(),
            KeyCode::Char('d') => return self.open_delete_confirm(),
            _ => {}
        }
        Mode::Normal
    }

    fn handle_form(&mut self, code: KeyCode, mut form: Form) -> Mode {
        match code {
            KeyCode::Esc => {
                self.set_status("Cancelled.", StatusKind::Info);
                return Mode::Normal;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.submit(&form) {
                Ok(message) => {
                    self.set_status(message, StatusKind::Info);
                    return Mode::Normal;
                }
                Err(err) => {
                    let message = surface_error(&err);
                    warn!(form = %form.title, error = %message, "form submission failed");
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Mode::Editing(form)
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmDelete) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Mode::Normal
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_delete(confirm.target) {
                    Ok(()) => {
                        self.set_status(
                            format!("Deleted {}.", confirm.description),
                            StatusKind::Info,
                        );
                    }
                    // The guard's reason is the useful part, e.g. "has copies".
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
                Mode::Normal
            }
            _ => Mode::ConfirmDelete(confirm),
        }
    }

    fn open_borrow_form(&mut self) -> Mode {
        if self.tab != Tab::Copies {
            self.set_status("Switch to Copies to borrow a copy.", StatusKind::Error);
            return Mode::Normal;
        }
        match self.listings.copies.get(self.selected) {
            Some(detail) => {
                let label = format!("{} #{}", detail.book_title, detail.copy.copy_number);
                Mode::Editing(Form::borrow(detail.copy.id, &label, today()))
            }
            None => {
                self.set_status("No copy selected.", StatusKind::Error);
                Mode::Normal
            }
        }
    }

    fn open_return_form(&mut self) -> Mode {
        if self.tab != Tab::Borrowings {
            self.set_status("Switch to Borrowings to return a copy.", StatusKind::Error);
            return Mode::Normal;
        }
        match self.listings.borrowings.get(self.selected) {
            Some(detail) => {
                let label = format!("{} #{}", detail.book_title, detail.copy_number);
                Mode::Editing(Form::return_copy(detail.borrowing.id, &label, today()))
            }
            None => {
                self.set_status("No borrowing selected.", StatusKind::Error);
                Mode::Normal
            }
        }
    }

    fn open_add_form(&mut self) -> Mode {
        match self.tab {
            Tab::Books => Mode::Editing(Form::add_book()),
            Tab::Users => Mode::Editing(Form::add_user()),
            Tab::Publishers => Mode::Editing(Form::add_publisher()),
            Tab::Copies | Tab::Borrowings => {
                self.set_status(
                    "Add books, users or publishers from their tabs.",
                    StatusKind::Error,
                );
                Mode::Normal
            }
        }
    }

    fn open_delete_confirm(&mut self) -> Mode {
        let idx = self.selected;
        let confirm = match self.tab {
            Tab::Copies => self.listings.copies.get(idx).map(|d| ConfirmDelete {
                target: DeleteTarget::Copy(d.copy.id),
                description: format!("copy #{} of {}", d.copy.copy_number, d.book_title),
            }),
            Tab::Borrowings => self.listings.borrowings.get(idx).map(|d| ConfirmDelete {
                target: DeleteTarget::Borrowing(d.borrowing.id),
                description: format!("borrowing of {} by {}", d.book_title, d.user_name),
            }),
            Tab::Books => self.listings.books.get(idx).map(|b| ConfirmDelete {
                target: DeleteTarget::Book(b.id),
                description: format!("book {}", b.title),
            }),
            Tab::Users => self.listings.users.get(idx).map(|u| ConfirmDelete {
                target: DeleteTarget::User(u.id),
                description: format!("user {}", u.name),
            }),
            Tab::Publishers => self.listings.publishers.get(idx).map(|p| ConfirmDelete {
                target: DeleteTarget::Publisher(p.id),
                description: format!("publisher {}", p.name),
            }),
        };

        match confirm {
            Some(confirm) => Mode::ConfirmDelete(confirm),
            None => {
                self.set_status("Nothing selected to delete.", StatusKind::Error);
                Mode::Normal
            }
        }
    }

    /// Run the operation behind a form and describe the outcome.
    fn submit(&mut self, form: &Form) -> Result<String> {
        let message = match form.purpose {
            FormPurpose::Borrow { copy_id } => {
                let email = form.text("User email")?;
                let user = find_user_by_email(&self.conn, &email)?.ok_or_else(|| {
                    LibraryError::not_found(format!("No user with email {email}."))
                })?;
                let borrowing = borrow(&self.conn, user.id, copy_id, form.date("Borrow date")?)?;
                format!(
                    "Lent to {} on {} (borrowing {}).",
                    user.name, borrowing.borrow_date, borrowing.id
                )
            }
            FormPurpose::Return { borrowing_id } => {
                let date = form
                    .date("Return date")?
                    .ok_or_else(|| anyhow!("Return date is required."))?;
                let borrowing = return_copy(&self.conn, borrowing_id, date)?;
                format!("Copy returned on {date} (borrowing {}).", borrowing.id)
            }
            FormPurpose::AddBook => {
                let publisher_name = form.text("Publisher")?;
                let publisher = find_publisher_by_name(&self.conn, &publisher_name)?
                    .ok_or_else(|| {
                        LibraryError::not_found(format!("No publisher named {publisher_name}."))
                    })?;
                let new = NewBook {
                    title: form.text("Title")?,
                    author: form.text("Author")?,
                    publication_year: form.number("Publication year")?,
                    isbn: form.text("ISBN")?,
                    publisher_id: publisher.id,
                };
                let copies: u32 = form.number("Number of copies")?;
                let (book, copies) = create_book_with_copies(&self.conn, &new, copies)?;
                format!("Added {} with {} copies.", book.title, copies.len())
            }
            FormPurpose::AddUser => {
                let user = create_user(&self.conn, &form.new_user()?)?;
                format!("Added user {user}.")
            }
            FormPurpose::AddPublisher => {
                let publisher = create_publisher(&self.conn, &form.new_publisher()?)?;
                format!("Added publisher {publisher}.")
            }
        };

        self.reload()?;
        Ok(message)
    }

    fn perform_delete(&mut self, target: DeleteTarget) -> Result<()> {
        match target {
            DeleteTarget::Book(id) => delete_book(&self.conn, id)?,
            DeleteTarget::Copy(id) => delete_copy(&self.conn, id)?,
            DeleteTarget::Borrowing(id) => delete_borrowing(&self.conn, id)?,
            DeleteTarget::User(id) => delete_user(&self.conn, id)?,
            DeleteTarget::Publisher(id) => delete_publisher(&self.conn, id)?,
        }
        self.reload()
    }

    fn reload(&mut self) -> Result<()> {
        self.listings = Listings::load(&self.conn, self.open_only)?;
        let len = self.listings.len(self.tab);
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        debug!(tab = self.tab.title(), rows = len, "reloaded listings");
        Ok(())
    }

    fn switch_tab(&mut self, tab: Tab) {
        self.tab = tab;
        self.selected = 0;
        self.clear_status();
    }

    fn move_selection(&mut self, offset: isize) {
        let len = self.listings.len(self.tab);
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + offset;
        self.selected = next.clamp(0, len as isize - 1) as usize;
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(TAB_BAR_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        self.draw_tabs(frame, chunks[0]);
        self.draw_list(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        match &self.mode {
            Mode::Editing(form) => self.draw_form(frame, area, form),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::Normal => {}
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Tab::ALL.iter().map(|tab| Line::from(tab.title())).collect();
        let selected = Tab::ALL.iter().position(|tab| *tab == self.tab).unwrap_or(0);
        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("Library Manager"))
            .select(selected)
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn draw_list(&self, frame: &mut Frame, area: Rect) {
        let rows = self.listings.rows(self.tab);
        let title = if self.tab == Tab::Borrowings && self.open_only {
            format!("{} (open only)", self.tab.title())
        } else {
            self.tab.title().to_string()
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if rows.is_empty() {
            let empty = Paragraph::new(Span::styled(
                "Nothing here yet.",
                Style::default().fg(Color::DarkGray),
            ))
            .block(block)
            .alignment(Alignment::Center);
            frame.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem> = rows.into_iter().map(ListItem::new).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph =
            Paragraph::new(vec![status_line, self.footer_instructions()]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let mut spans = vec![
            Span::styled("[Tab]", key_style),
            Span::raw(" Switch   "),
            Span::styled("[↑↓]", key_style),
            Span::raw(" Navigate   "),
        ];
        let actions: &[(&str, &str)] = match self.tab {
            Tab::Copies => &[("[b]", " Borrow   "), ("[d]", " Delete   ")],
            Tab::Borrowings => &[
                ("[r]", " Return   "),
                ("[o]", " Open only   "),
                ("[d]", " Delete   "),
            ],
            Tab::Books | Tab::Users | Tab::Publishers => {
                &[("[a]", " Add   "), ("[d]", " Delete   ")]
            }
        };
        for (key, label) in actions {
            spans.push(Span::styled(*key, key_style));
            spans.push(Span::raw(*label));
        }
        spans.push(Span::styled("[g]", key_style));
        spans.push(Span::raw(" Reload   "));
        spans.push(Span::styled("[q]", key_style));
        spans.push(Span::raw(" Quit"));
        Line::from(spans)
    }

    fn draw_form(&self, frame: &mut Frame, area: Rect, form: &Form) {
        let popup_area = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(form.title.clone())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = form.build_lines();
        lines.push(Line::from(""));
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let (dx, dy) = form.cursor_offset();
        frame.set_cursor_position((inner.x + dx, inner.y + dy));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Removal")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("Delete {}?", confirm.description)),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fetch_open_borrowings, open_in_memory};
    use crate::models::{NewPublisher, NewUser};

    fn type_str(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    fn app_with_copy() -> App {
        let conn = open_in_memory().unwrap();
        let publisher = create_publisher(
            &conn,
            &NewPublisher {
                name: "Orbit".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        create_book_with_copies(
            &conn,
            &NewBook {
                title: "Leviathan Wakes".to_string(),
                author: "James S. A. Corey".to_string(),
                publication_year: 2011,
                isbn: "9780316129084".to_string(),
                publisher_id: publisher.id,
            },
            1,
        )
        .unwrap();
        create_user(
            &conn,
            &NewUser {
                name: "Holden".to_string(),
                email: "holden@example.org".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        App::new(conn).unwrap()
    }

    fn status_text(app: &App) -> String {
        app.status
            .as_ref()
            .map(|status| status.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn borrow_through_the_form() {
        let mut app = app_with_copy();
        app.handle_key(KeyCode::Char('b')).unwrap();
        assert!(matches!(app.mode, Mode::Editing(_)));
        type_str(&mut app, "holden@example.org");
        app.handle_key(KeyCode::Enter).unwrap();

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(fetch_open_borrowings(&app.conn).unwrap().len(), 1);
        assert!(status_text(&app).starts_with("Lent to Holden"));
    }

    #[test]
    fn second_borrow_shows_conflict_instead_of_failing() {
        let mut app = app_with_copy();
        for _ in 0..2 {
            app.handle_key(KeyCode::Char('b')).unwrap();
            type_str(&mut app, "holden@example.org");
            app.handle_key(KeyCode::Enter).unwrap();
        }

        // The form stays open with the error and the footer shows it in red.
        match &app.mode {
            Mode::Editing(form) => assert!(form.error.as_deref().unwrap().starts_with("Conflict")),
            _ => panic!("form should stay open after a failed borrow"),
        }
        assert!(status_text(&app).contains("already borrowed"));
        app.handle_key(KeyCode::Esc).unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(fetch_open_borrowings(&app.conn).unwrap().len(), 1);
    }

    #[test]
    fn blocked_delete_is_reported() {
        let mut app = app_with_copy();
        app.handle_key(KeyCode::Tab).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.tab, Tab::Books);

        app.handle_key(KeyCode::Char('d')).unwrap();
        app.handle_key(KeyCode::Char('y')).unwrap();
        assert!(status_text(&app).starts_with("Conflict"));
        assert_eq!(app.listings.books.len(), 1);
    }

    #[test]
    fn quit_key_exits() {
        let mut app = app_with_copy();
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
    }
}
