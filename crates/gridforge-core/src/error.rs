//! Error types for the grid pipeline

use thiserror::Error;

/// Grid pipeline error type
#[derive(Error, Debug)]
pub enum GridError {
    /// Requested table configuration missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or unresolvable request parameters
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Failure from the data-access collaborator
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Invalid collaborator wiring
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for grid operations
pub type GridResult<T> = Result<T, GridError>;
