//! SQLite connection configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Connection settings for a SQLite-backed grid source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file path; `:memory:` for an in-memory database
    pub path: PathBuf,
    /// WAL journal mode for better read concurrency
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Foreign key enforcement
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout() -> u32 {
    5000
}

impl SqliteConfig {
    /// Config for a database file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal_mode: true,
            foreign_keys: true,
            busy_timeout_ms: default_busy_timeout(),
        }
    }

    /// Config for an in-memory database (tests, mostly)
    pub fn memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            // WAL is meaningless without a file
            wal_mode: false,
            foreign_keys: true,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}
