//! Error types for the SQLite data source

use gridforge_core::GridError;
use thiserror::Error;

/// SQLite data-source error type
#[derive(Error, Debug)]
pub enum SqliteError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(String),

    /// Plan could not be rendered to SQL
    #[error("Render error: {0}")]
    Render(String),

    /// Finder name with no registered recipe
    #[error("Unknown finder: {0}")]
    UnknownFinder(String),

    /// Underlying rusqlite error
    #[error("SQLite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Result type for SQLite data-source operations
pub type SqliteResult<T> = Result<T, SqliteError>;

impl From<SqliteError> for GridError {
    fn from(err: SqliteError) -> Self {
        GridError::DataAccess(err.to_string())
    }
}
