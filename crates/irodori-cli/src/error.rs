use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] irodori_core::Error),
    #[error(transparent)]
    Remote(#[from] irodori_core::RemoteError),
    #[error(transparent)]
    Config(#[from] irodori_core::ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No content provided")]
    EmptyContent,
    #[error("ID cannot be empty")]
    EmptyId,
    #[error("Nothing to change; pass at least one field")]
    NothingToUpdate,
    #[error("No {kind} found for id/prefix: {query}")]
    NotFound { kind: &'static str, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Queue entry {0} does not exist")]
    QueueEntryNotFound(i64),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error(
        "Sync is not configured. Run `irodori config set-remote <url>` or set IRODORI_REMOTE_URL."
    )]
    SyncNotConfigured,
}
