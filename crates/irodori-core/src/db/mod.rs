//! Database layer for Irodori

mod connection;
mod migrations;
mod queue_repository;
mod repository;
mod settings_repository;

pub use connection::Database;
pub use queue_repository::{ChangeQueue, SqliteChangeQueue};
pub use repository::{entity_columns, EntityRow, SqliteEntityRepository};
pub use settings_repository::{
    SqliteSyncMetaRepository, SyncMetaRepository, LAST_SYNC_AT_KEY, REMOTE_URL_KEY,
};
