//! Error types for greyspf

use thiserror::Error;

/// Main error type for greyspf
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration source. Fatal for the process.
    #[error("{0}")]
    Config(String),

    /// Protocol line that does not match `key=value`. Carries the line verbatim.
    #[error("Could not match line \"{0}\"")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A stored document that cannot be turned back into a value.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for greyspf
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the process must stop after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
