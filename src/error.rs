//! Error types for voidmail.

use thiserror::Error;

/// Common error type for voidmail.
#[derive(Error, Debug)]
pub enum VoidmailError {
    /// Database error.
    ///
    /// Wraps any error reported by the sqlx backend that is not a
    /// uniqueness violation.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// A unique constraint rejected the write (address, token or domain name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(String),
}

impl VoidmailError {
    /// Whether this error is a uniqueness violation that a caller may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, VoidmailError::Conflict(_))
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for VoidmailError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                VoidmailError::Conflict(db_err.message().to_string())
            }
            _ => VoidmailError::Database(e.to_string()),
        }
    }
}

/// Result type alias for voidmail operations.
pub type Result<T> = std::result::Result<T, VoidmailError>;
