//! Change queue repository implementation

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::models::{EntityKind, QueueEntry, RecordId, SyncOperation};

/// Storage operations on the outbound change queue
pub trait ChangeQueue {
    /// Replace any entry for `(kind, record_id)` with a new one; returns the
    /// new entry id.
    ///
    /// The delete and insert must share a transaction with the mutation
    /// that caused them.
    fn enqueue(
        &self,
        kind: EntityKind,
        record_id: &RecordId,
        operation: SyncOperation,
        payload: Option<&serde_json::Value>,
        now: i64,
    ) -> Result<i64>;

    /// Remove exactly this entry. A newer entry for the same record survives.
    fn dequeue(&self, entry_id: i64) -> Result<()>;

    /// Bump the retry counter of one entry
    fn increment_retry(&self, entry_id: i64) -> Result<()>;

    /// Entries still eligible for retry, oldest first
    fn list_pending(&self, max_retries: u32) -> Result<Vec<QueueEntry>>;

    /// Entries that reached the retry ceiling, oldest first
    fn list_dormant(&self, max_retries: u32) -> Result<Vec<QueueEntry>>;

    /// Reset an entry's retry counter; returns whether it existed
    fn revive(&self, entry_id: i64) -> Result<bool>;

    /// The entry queued for this record, dormant or not
    fn entry_for(&self, kind: EntityKind, record_id: &RecordId) -> Result<Option<QueueEntry>>;

    /// Whether a retryable entry exists for this record
    fn has_active_entry(&self, kind: EntityKind, record_id: &RecordId, max_retries: u32)
        -> Result<bool>;

    /// Every queued entry, dormant ones included
    fn pending_count(&self) -> Result<u64>;

    fn dormant_count(&self, max_retries: u32) -> Result<u64>;
}

/// `SQLite` implementation of `ChangeQueue`
pub struct SqliteChangeQueue<'a> {
    conn: &'a Connection,
}

const ENTRY_COLUMNS: &str =
    "id, table_name, record_id, operation, payload, created_at, retry_count";

impl<'a> SqliteChangeQueue<'a> {
    /// Create a new queue over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
        let table: String = row.get(1)?;
        let kind = EntityKind::from_table_name(&table).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown queue table {table}").into(),
            )
        })?;
        let operation: String = row.get(3)?;
        let operation = operation.parse::<SyncOperation>().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(err))
        })?;
        let payload = row
            .get::<_, Option<String>>(4)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(err))
            })?;

        Ok(QueueEntry {
            id: row.get(0)?,
            kind,
            record_id: row.get(2)?,
            operation,
            payload,
            created_at: row.get(5)?,
            retry_count: row.get(6)?,
        })
    }

    fn query_entries(&self, condition: &str, max_retries: u32) -> Result<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE {condition} ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![max_retries], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Fetch one entry by id
    pub fn get(&self, entry_id: i64) -> Result<Option<QueueEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![entry_id], Self::parse_entry)
            .optional()?)
    }
}

impl ChangeQueue for SqliteChangeQueue<'_> {
    fn enqueue(
        &self,
        kind: EntityKind,
        record_id: &RecordId,
        operation: SyncOperation,
        payload: Option<&serde_json::Value>,
        now: i64,
    ) -> Result<i64> {
        if operation != SyncOperation::Delete && payload.is_none() {
            return Err(Error::InvalidInput(format!(
                "{operation} of {kind}/{record_id} needs a payload"
            )));
        }
        let payload = payload.map(serde_json::to_string).transpose()?;

        self.conn.execute(
            "DELETE FROM sync_queue WHERE table_name = ?1 AND record_id = ?2",
            params![kind.table_name(), record_id],
        )?;
        self.conn.execute(
            "INSERT INTO sync_queue (table_name, record_id, operation, payload, created_at, retry_count)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![kind.table_name(), record_id, operation.as_str(), payload, now],
        )?;
        let entry_id = self.conn.last_insert_rowid();

        tracing::debug!(
            table = kind.table_name(),
            record_id = %record_id,
            operation = operation.as_str(),
            entry_id,
            "Queued change"
        );
        Ok(entry_id)
    }

    fn dequeue(&self, entry_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE id = ?1", params![entry_id])?;
        Ok(())
    }

    fn increment_retry(&self, entry_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET retry_count = retry_count + 1 WHERE id = ?1",
            params![entry_id],
        )?;
        Ok(())
    }

    fn list_pending(&self, max_retries: u32) -> Result<Vec<QueueEntry>> {
        self.query_entries("retry_count < ?1", max_retries)
    }

    fn list_dormant(&self, max_retries: u32) -> Result<Vec<QueueEntry>> {
        self.query_entries("retry_count >= ?1", max_retries)
    }

    fn revive(&self, entry_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET retry_count = 0 WHERE id = ?1",
            params![entry_id],
        )?;
        Ok(rows > 0)
    }

    fn entry_for(&self, kind: EntityKind, record_id: &RecordId) -> Result<Option<QueueEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE table_name = ?1 AND record_id = ?2"
        );
        Ok(self
            .conn
            .query_row(&sql, params![kind.table_name(), record_id], Self::parse_entry)
            .optional()?)
    }

    fn has_active_entry(
        &self,
        kind: EntityKind,
        record_id: &RecordId,
        max_retries: u32,
    ) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sync_queue
             WHERE table_name = ?1 AND record_id = ?2 AND retry_count < ?3)",
            params![kind.table_name(), record_id, max_retries],
            |row| row.get(0),
        )?)
    }

    fn pending_count(&self) -> Result<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?)
    }

    fn dormant_count(&self, max_retries: u32) -> Result<u64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE retry_count >= ?1",
            params![max_retries],
            |row| row.get(0),
        )?)
    }
}
