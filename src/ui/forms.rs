use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{NewPublisher, NewUser};

/// Date format accepted by every date field.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Which characters a field accepts.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum FieldKind {
    Text,
    Digits,
    Date,
}

#[derive(Clone, Debug)]
pub(crate) struct FormField {
    pub(crate) label: &'static str,
    pub(crate) value: String,
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
}

impl FormField {
    fn required(label: &'static str, kind: FieldKind) -> Self {
        Self {
            label,
            value: String::new(),
            kind,
            required: true,
        }
    }

    fn optional(label: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(label, FieldKind::Text)
        }
    }

    fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    fn accepts(&self, ch: char) -> bool {
        match self.kind {
            FieldKind::Text => !ch.is_control(),
            FieldKind::Digits => ch.is_ascii_digit(),
            FieldKind::Date => ch.is_ascii_digit() || ch == '-',
        }
    }
}

/// What a submitted form is for. Carries the ids the form was opened on.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum FormPurpose {
    Borrow { copy_id: i64 },
    Return { borrowing_id: i64 },
    AddBook,
    AddUser,
    AddPublisher,
}

/// A modal form: a titled list of labelled fields with one active field.
#[derive(Clone, Debug)]
pub(crate) struct Form {
    pub(crate) title: String,
    pub(crate) purpose: FormPurpose,
    pub(crate) fields: Vec<FormField>,
    pub(crate) active: usize,
    pub(crate) error: Option<String>,
}

impl Form {
    fn new(title: impl Into<String>, purpose: FormPurpose, fields: Vec<FormField>) -> Self {
        Self {
            title: title.into(),
            purpose,
            fields,
            active: 0,
            error: None,
        }
    }

    /// Lend a copy: who borrows it and from when.
    pub(crate) fn borrow(copy_id: i64, copy_label: &str, today: NaiveDate) -> Self {
        Self::new(
            format!("Borrow {copy_label}"),
            FormPurpose::Borrow { copy_id },
            vec![
                FormField::required("User email", FieldKind::Text),
                FormField::required("Borrow date", FieldKind::Date)
                    .with_value(today.format(DATE_FORMAT).to_string()),
            ],
        )
    }

    pub(crate) fn return_copy(borrowing_id: i64, label: &str, today: NaiveDate) -> Self {
        Self::new(
            format!("Return {label}"),
            FormPurpose::Return { borrowing_id },
            vec![FormField::required("Return date", FieldKind::Date)
                .with_value(today.format(DATE_FORMAT).to_string())],
        )
    }

    /// The librarian "add book" dialog, which also creates the copies.
    pub(crate) fn add_book() -> Self {
        Self::new(
            "Add Book",
            FormPurpose::AddBook,
            vec![
                FormField::required("Title", FieldKind::Text),
                FormField::required("Author", FieldKind::Text),
                FormField::required("Publisher", FieldKind::Text),
                FormField::required("Publication year", FieldKind::Digits),
                FormField::required("ISBN", FieldKind::Text),
                FormField::required("Number of copies", FieldKind::Digits).with_value("1"),
            ],
        )
    }

    pub(crate) fn add_user() -> Self {
        Self::new(
            "Add User",
            FormPurpose::AddUser,
            vec![
                FormField::required("Name", FieldKind::Text),
                FormField::required("Email", FieldKind::Text),
                FormField::optional("Phone"),
                FormField::optional("Address"),
            ],
        )
    }

    pub(crate) fn add_publisher() -> Self {
        Self::new(
            "Add Publisher",
            FormPurpose::AddPublisher,
            vec![
                FormField::required("Name", FieldKind::Text),
                FormField::optional("Address"),
                FormField::optional("Phone"),
            ],
        )
    }

    pub(crate) fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + 1) % self.fields.len();
        }
    }

    pub(crate) fn previous_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Append a character to the active field, validating allowed input.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        match self.fields.get_mut(self.active) {
            Some(field) if field.accepts(ch) => {
                field.value.push(ch);
                true
            }
            _ => false,
        }
    }

    /// Remove the last character from the active field.
    pub(crate) fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.active) {
            field.value.pop();
        }
    }

    fn field(&self, label: &str) -> Result<&FormField> {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .ok_or_else(|| anyhow!("Form has no field named {label}."))
    }

    /// Trimmed value of a required field.
    pub(crate) fn text(&self, label: &str) -> Result<String> {
        let field = self.field(label)?;
        let value = field.value.trim();
        if field.required && value.is_empty() {
            return Err(anyhow!("{label} is required."));
        }
        Ok(value.to_string())
    }

    /// `None` for a blank optional field.
    pub(crate) fn optional_text(&self, label: &str) -> Result<Option<String>> {
        let value = self.field(label)?.value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    pub(crate) fn number<T: std::str::FromStr>(&self, label: &str) -> Result<T> {
        self.text(label)?
            .parse::<T>()
            .map_err(|_| anyhow!("{label} must be a whole number."))
    }

    /// A blank date field yields `None`; the workflow decides whether that
    /// is acceptable.
    pub(crate) fn date(&self, label: &str) -> Result<Option<NaiveDate>> {
        match self.optional_text(label)? {
            None => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                .map(Some)
                .with_context(|| format!("{label} must look like 2024-01-31.")),
        }
    }

    pub(crate) fn new_user(&self) -> Result<NewUser> {
        Ok(NewUser {
            name: self.text("Name")?,
            email: self.text("Email")?,
            phone: self.optional_text("Phone")?,
            address: self.optional_text("Address")?,
        })
    }

    pub(crate) fn new_publisher(&self) -> Result<NewPublisher> {
        Ok(NewPublisher {
            name: self.text("Name")?,
            address: self.optional_text("Address")?,
            phone: self.optional_text("Phone")?,
        })
    }

    /// Render one line per field, highlighting the active one.
    pub(crate) fn build_lines(&self) -> Vec<Line<'static>> {
        self.fields
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let is_active = idx == self.active;
                let display = match (field.value.is_empty(), field.required) {
                    (true, true) => "<required>".to_string(),
                    (true, false) => "<optional>".to_string(),
                    (false, _) => field.value.clone(),
                };
                let style = if is_active {
                    Style::default().fg(Color::Yellow)
                } else if field.value.is_empty() {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };
                Line::from(vec![
                    Span::raw(format!("{}: ", field.label)),
                    Span::styled(display, style),
                ])
            })
            .collect()
    }

    /// Column and row offsets of the cursor inside the form body.
    pub(crate) fn cursor_offset(&self) -> (u16, u16) {
        match self.fields.get(self.active) {
            Some(field) => (
                (field.label.len() + 2 + field.value.chars().count()) as u16,
                self.active as u16,
            ),
            None => (0, 0),
        }
    }
}

/// What a pending delete confirmation would remove.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum DeleteTarget {
    Book(i64),
    Copy(i64),
    Borrowing(i64),
    User(i64),
    Publisher(i64),
}

/// State for the "are you sure?" dialog.
#[derive(Clone, Debug)]
pub(crate) struct ConfirmDelete {
    pub(crate) target: DeleteTarget,
    pub(crate) description: String,
}
