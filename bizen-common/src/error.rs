//! Common error types for BIZEN

use thiserror::Error;

/// Common result type for BIZEN operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the service and the backfill tool
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write would violate a uniqueness or capacity rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller may not act on this resource (e.g. locked section)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Hosted identity provider failure
    #[error("Identity provider error: {0}")]
    Identity(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the database rejected a write on a UNIQUE / PRIMARY KEY constraint
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
