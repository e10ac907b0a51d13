//! Binary entry point that glues the SQLite-backed library to the TUI: resolve
//! the configuration, start file logging, open the database, and drive the
//! Ratatui event loop until the user exits.
use anyhow::Context;
use library_manager::{db, logging, run_app, App, Config};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init(&config)?;

    let conn = db::open_database(&config.database_path).with_context(|| {
        format!(
            "failed to open library database at {}",
            config.database_path.display()
        )
    })?;
    info!(database = %config.database_path.display(), "library manager starting");

    let mut app = App::new(conn)?;
    run_app(&mut app)
}
