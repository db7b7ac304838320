//! Error types for catalog operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// An existing file is not a catalog with the expected schema.
    #[error("Not a filedex catalog (unexpected schema): {path}")]
    InvalidStore { path: PathBuf },

    /// Empty or malformed ingestion batch, or an empty query.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Underlying SQLite failure.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure outside of SQLite.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Result alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
