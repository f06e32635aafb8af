//! Error types for irodori-core

use thiserror::Error;

/// Result type alias using irodori-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the local store and the engine's local bookkeeping.
///
/// Remote failures live in [`crate::remote::RemoteError`]; they never escape
/// a reconciliation cycle as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn poisoned() -> Self {
        Self::Database("local store lock poisoned".to_string())
    }
}
