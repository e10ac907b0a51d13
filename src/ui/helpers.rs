use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::error::LibraryError;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the message worth showing from a chained error. Library errors
/// already read well, so the first one found in the chain wins; otherwise the
/// root cause is used.
pub(crate) fn surface_error(err: &Error) -> String {
    if let Some(library) = err.chain().find_map(|cause| cause.downcast_ref::<LibraryError>()) {
        return library.to_string();
    }
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}
