//! Direct SQL transport to a hosted libSQL database (Turso / sqld).

use libsql::{Builder, Connection, Database, Value};
use tokio::sync::Mutex;

use super::{RemoteAdapter, RemoteError, RemoteResult};
use crate::db::entity_columns;
use crate::models::{EntityKind, Record, RecordId};

impl From<libsql::Error> for RemoteError {
    fn from(error: libsql::Error) -> Self {
        Self::Database(error.to_string())
    }
}

/// Columns stored as `INTEGER` 0/1 but exposed as booleans
const BOOL_COLUMNS: &[&str] = &["is_done"];

/// The remote keeps no tombstones; deletes are physical
fn remote_columns(kind: EntityKind) -> Vec<&'static str> {
    entity_columns(kind)
        .iter()
        .copied()
        .filter(|column| *column != "is_deleted")
        .collect()
}

fn create_table_sql(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Task => {
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                category TEXT NOT NULL DEFAULT 'short_term',
                is_done INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"
        }
        EntityKind::ProjectNote => {
            "CREATE TABLE IF NOT EXISTS project_notes (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"
        }
        EntityKind::Note => {
            "CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"
        }
        EntityKind::Prompt => {
            "CREATE TABLE IF NOT EXISTS prompts (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"
        }
    }
}

/// `INSERT ... ON CONFLICT DO UPDATE` that only replaces an older row
fn upsert_sql(kind: EntityKind) -> String {
    let columns = remote_columns(kind);
    let table = kind.table_name();
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let assignments = columns
        .iter()
        .filter(|column| !matches!(**column, "id" | "created_at"))
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders}) \
         ON CONFLICT(id) DO UPDATE SET {assignments} \
         WHERE excluded.updated_at >= {table}.updated_at",
        columns.join(", ")
    )
}

fn json_to_value(column: &str, value: Option<&serde_json::Value>) -> RemoteResult<Value> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Value::Null),
        Some(serde_json::Value::Bool(flag)) => Ok(Value::Integer(i64::from(*flag))),
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| RemoteError::Protocol(format!("{column} is not an integer"))),
        Some(serde_json::Value::String(text)) => Ok(Value::Text(text.clone())),
        Some(_) => Err(RemoteError::Protocol(format!(
            "{column} has an unsupported type"
        ))),
    }
}

fn value_to_json(column: &str, value: Value) -> RemoteResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(number) if BOOL_COLUMNS.contains(&column) => (number != 0).into(),
        Value::Integer(number) => number.into(),
        Value::Text(text) => text.into(),
        Value::Real(_) | Value::Blob(_) => {
            return Err(RemoteError::Protocol(format!(
                "{column} has an unsupported type"
            )))
        }
    })
}

/// Remote libSQL database reached over the network.
///
/// Connects lazily and caches the connection until a call fails.
pub struct SqlRemote {
    url: String,
    auth_token: String,
    state: Mutex<Option<RemoteConnection>>,
}

struct RemoteConnection {
    // Kept alive for as long as the connection is cached
    _db: Database,
    conn: Connection,
}

impl std::fmt::Debug for SqlRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SqlRemote")
            .field("url", &self.url)
            .field("auth_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SqlRemote {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            state: Mutex::new(None),
        }
    }

    /// Cached connection, or a fresh one verified with `SELECT 1` and with
    /// the remote tables created
    async fn connection(&self) -> RemoteResult<Connection> {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            return Ok(cached.conn.clone());
        }

        let db = Builder::new_remote(self.url.clone(), self.auth_token.clone())
            .build()
            .await
            .map_err(|error| RemoteError::Unreachable(error.to_string()))?;
        let conn = db
            .connect()
            .map_err(|error| RemoteError::Unreachable(error.to_string()))?;
        conn.query("SELECT 1", ())
            .await
            .map_err(|error| RemoteError::Unreachable(error.to_string()))?;

        for kind in EntityKind::ALL {
            conn.execute(create_table_sql(kind), ()).await?;
        }
        tracing::info!(url = %self.url, "Connected to remote database");

        *state = Some(RemoteConnection {
            _db: db,
            conn: conn.clone(),
        });
        Ok(conn)
    }

    async fn reset(&self) {
        self.state.lock().await.take();
    }

    /// Run `call` on the connection, dropping the cache if it fails
    async fn with_connection<T, F, Fut>(&self, call: F) -> RemoteResult<T>
    where
        F: FnOnce(Connection) -> Fut + Send,
        Fut: std::future::Future<Output = RemoteResult<T>> + Send,
    {
        let conn = self.connection().await?;
        let result = call(conn).await;
        if result.is_err() {
            self.reset().await;
        }
        result
    }
}

impl RemoteAdapter for SqlRemote {
    async fn health_check(&self) -> bool {
        let result = self
            .with_connection(|conn| async move {
                conn.query("SELECT 1", ()).await?;
                Ok::<_, RemoteError>(())
            })
            .await;
        match result {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!("Health check failed: {error}");
                false
            }
        }
    }

    async fn pull_all(&self, kind: EntityKind) -> RemoteResult<Vec<Record>> {
        let columns = remote_columns(kind);
        let sql = format!("SELECT {} FROM {}", columns.join(", "), kind.table_name());

        self.with_connection(|conn| async move {
            let mut rows = conn.query(&sql, ()).await?;
            let mut records = Vec::new();
            while let Some(row) = rows.next().await? {
                let mut object = serde_json::Map::with_capacity(columns.len());
                for (index, column) in (0_i32..).zip(columns.iter()) {
                    let value = value_to_json(column, row.get_value(index)?)?;
                    object.insert((*column).to_string(), value);
                }
                let record = Record::from_payload(kind, serde_json::Value::Object(object))
                    .map_err(|error| RemoteError::Protocol(format!("{kind} row: {error}")))?;
                records.push(record);
            }
            Ok::<_, RemoteError>(records)
        })
        .await
    }

    async fn upsert(&self, record: &Record) -> RemoteResult<()> {
        let kind = record.kind();
        let payload = record
            .to_payload()
            .map_err(|error| RemoteError::Protocol(error.to_string()))?;
        let params = remote_columns(kind)
            .into_iter()
            .map(|column| json_to_value(column, payload.get(column)))
            .collect::<RemoteResult<Vec<_>>>()?;
        let sql = upsert_sql(kind);

        self.with_connection(|conn| async move {
            conn.execute(&sql, params).await?;
            Ok::<_, RemoteError>(())
        })
        .await
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> RemoteResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table_name());
        let id = id.to_string();

        self.with_connection(|conn| async move {
            // Zero affected rows is fine
            conn.execute(&sql, vec![Value::Text(id)]).await?;
            Ok::<_, RemoteError>(())
        })
        .await
    }
}
