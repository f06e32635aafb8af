//! Sync metadata repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

/// Remote endpoint URL chosen by the user
pub const REMOTE_URL_KEY: &str = "remote_url";
/// Start time of the last fully successful reconciliation cycle
pub const LAST_SYNC_AT_KEY: &str = "last_sync_at";

/// Trait for the small key/value table next to the entity tables
pub trait SyncMetaRepository {
    fn get_value(&self, key: &str) -> Result<Option<String>>;

    fn set_value(&self, key: &str, value: &str) -> Result<()>;

    fn remove_value(&self, key: &str) -> Result<()>;

    /// Last successful sync time, ignoring unparsable values
    fn last_sync_at(&self) -> Result<Option<i64>> {
        Ok(self
            .get_value(LAST_SYNC_AT_KEY)?
            .and_then(|value| value.trim().parse().ok()))
    }
}

/// `SQLite` implementation of `SyncMetaRepository`
pub struct SqliteSyncMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncMetaRepository for SqliteSyncMetaRepository<'_> {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_meta WHERE key = ?1", params![key])?;
        Ok(())
    }
}
