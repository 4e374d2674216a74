//! Runtime configuration for hosts embedding the core.
//!
//! Values come from defaults and may be overridden by environment variables:
//! - `STUFF_DB_PATH`: database file; unset means in-memory.
//! - `STUFF_LOG_DIR`: absolute log directory; unset disables file logging.
//! - `STUFF_LOG_LEVEL`: `trace|debug|info|warn|error`.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{default_log_level, init_logging, LoggingError};
use rusqlite::Connection;
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "STUFF_DB_PATH";
pub const LOG_DIR_VAR: &str = "STUFF_LOG_DIR";
pub const LOG_LEVEL_VAR: &str = "STUFF_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_dir: None,
            log_level: default_log_level().to_string(),
        }
    }
}

impl CoreConfig {
    /// Builds configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(DB_PATH_VAR) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = read(LOG_DIR_VAR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = read(LOG_LEVEL_VAR) {
            config.log_level = level;
        }
        config
    }

    /// Opens the configured database with migrations applied.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns `Ok(false)` when no directory is set.
    pub fn init_logging(&self) -> Result<bool, LoggingError> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        init_logging(&self.log_level, &dir.to_string_lossy())?;
        Ok(true)
    }
}
