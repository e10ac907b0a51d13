//! Runtime configuration. Everything has a default under the user's home
//! directory; environment variables override individual settings.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories::BaseDirs;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".library-manager";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "library.sqlite";
/// Log file name stored next to the database.
const LOG_FILE_NAME: &str = "library-manager.log";

pub const DB_PATH_VAR: &str = "LIBRARY_MANAGER_DB";
pub const LOG_PATH_VAR: &str = "LIBRARY_MANAGER_LOG";
pub const LOG_FILTER_VAR: &str = "LIBRARY_MANAGER_LOG_FILTER";

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_path: PathBuf,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `library_manager=debug`.
    pub log_filter: String,
}

impl Config {
    /// Resolve the configuration from the environment, falling back to the
    /// data directory in the user's home.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_path = match non_empty(DB_PATH_VAR) {
            Some(path) => PathBuf::from(path),
            None => data_dir()?.join(DB_FILE_NAME),
        };
        let log_path = match non_empty(LOG_PATH_VAR) {
            Some(path) => PathBuf::from(path),
            None => data_dir()?.join(LOG_FILE_NAME),
        };
        let log_filter =
            non_empty(LOG_FILTER_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_path,
            log_path,
            log_filter,
        })
    }

    /// Configuration rooted at an explicit database file; the log sits next to it.
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        let database_path = path.into();
        let log_path = database_path.with_file_name(LOG_FILE_NAME);
        Self {
            database_path,
            log_path,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Resolve the absolute path to the data directory inside the user's home.
fn data_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_every_setting() {
        let config = Config::from_lookup(lookup(&[
            (DB_PATH_VAR, "/tmp/lib.sqlite"),
            (LOG_PATH_VAR, "/tmp/lib.log"),
            (LOG_FILTER_VAR, "debug"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/lib.sqlite"));
        assert_eq!(config.log_path, PathBuf::from("/tmp/lib.log"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[(LOG_FILTER_VAR, "  ")])).unwrap();
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.database_path.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn explicit_database_path_keeps_log_alongside() {
        let config = Config::with_database_path("/data/library.sqlite");
        assert_eq!(config.log_path, PathBuf::from("/data/library-manager.log"));
    }
}
