//! Ratatui front-end. A thin layer over [`crate::db`] and
//! [`crate::circulation`]: it lists rows, opens forms, and turns every failed
//! operation into a status-line message instead of exiting.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
