//! Entity repository implementation

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{EntityKind, Note, ProjectNote, Prompt, Record, RecordId, Task, TaskCategory};

/// Mapping between an entity model and its table
pub trait EntityRow: Sized + Into<Record> {
    const KIND: EntityKind;

    /// Column list: `id` first, then payload, then
    /// `created_at, updated_at, is_deleted`
    const COLUMNS: &'static [&'static str];

    /// `ORDER BY` clause for live listings
    const ORDER_BY: &'static str;

    /// Parse a row selected with [`Self::COLUMNS`]
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Values in [`Self::COLUMNS`] order
    fn to_values(&self) -> Vec<Value>;
}

/// Column list of a kind's table, as in [`EntityRow::COLUMNS`]
pub const fn entity_columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Task => Task::COLUMNS,
        EntityKind::ProjectNote => ProjectNote::COLUMNS,
        EntityKind::Note => Note::COLUMNS,
        EntityKind::Prompt => Prompt::COLUMNS,
    }
}

fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

impl EntityRow for Task {
    const KIND: EntityKind = EntityKind::Task;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "category",
        "is_done",
        "created_at",
        "updated_at",
        "is_deleted",
    ];
    const ORDER_BY: &'static str = "updated_at DESC, id ASC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: TaskCategory::parse_lossy(&row.get::<_, String>(3)?),
            is_done: row.get::<_, i64>(4)? != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            is_deleted: row.get::<_, i64>(7)? != 0,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.title.clone()),
            self.description.clone().map_or(Value::Null, Value::Text),
            Value::Text(self.category.as_str().to_string()),
            flag(self.is_done),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            flag(self.is_deleted),
        ]
    }
}

impl EntityRow for ProjectNote {
    const KIND: EntityKind = EntityKind::ProjectNote;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "task_id",
        "content",
        "created_at",
        "updated_at",
        "is_deleted",
    ];
    const ORDER_BY: &'static str = "updated_at DESC, id ASC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            is_deleted: row.get::<_, i64>(5)? != 0,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.task_id.to_string()),
            Value::Text(self.content.clone()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            flag(self.is_deleted),
        ]
    }
}

impl EntityRow for Note {
    const KIND: EntityKind = EntityKind::Note;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "content",
        "created_at",
        "updated_at",
        "is_deleted",
    ];
    const ORDER_BY: &'static str = "updated_at DESC, id ASC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            is_deleted: row.get::<_, i64>(5)? != 0,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.title.clone()),
            Value::Text(self.content.clone()),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            flag(self.is_deleted),
        ]
    }
}

impl EntityRow for Prompt {
    const KIND: EntityKind = EntityKind::Prompt;
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "content",
        "sort_order",
        "created_at",
        "updated_at",
        "is_deleted",
    ];
    const ORDER_BY: &'static str = "sort_order ASC, created_at ASC, id ASC";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            sort_order: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            is_deleted: row.get::<_, i64>(6)? != 0,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.to_string()),
            Value::Text(self.title.clone()),
            Value::Text(self.content.clone()),
            Value::Integer(self.sort_order),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            flag(self.is_deleted),
        ]
    }
}

/// `SQLite` access to the entity tables.
///
/// Works on a plain connection or inside a transaction (which derefs to
/// one); the store decides where transaction boundaries go.
pub struct SqliteEntityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEntityRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Fetch a row by id, tombstoned or not
    pub fn get<T: EntityRow>(&self, id: &RecordId) -> Result<Option<T>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            T::COLUMNS.join(", "),
            T::KIND.table_name()
        );
        Ok(self.conn.query_row(&sql, params![id], T::from_row).optional()?)
    }

    /// Fetch a row by id unless it is tombstoned
    pub fn get_live<T: EntityRow>(&self, id: &RecordId) -> Result<Option<T>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1 AND is_deleted = 0",
            T::COLUMNS.join(", "),
            T::KIND.table_name()
        );
        Ok(self.conn.query_row(&sql, params![id], T::from_row).optional()?)
    }

    /// All live rows in the kind's default order
    pub fn list<T: EntityRow>(&self) -> Result<Vec<T>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE is_deleted = 0 ORDER BY {}",
            T::COLUMNS.join(", "),
            T::KIND.table_name(),
            T::ORDER_BY
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], T::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Live project notes of one task
    pub fn list_project_notes(&self, task_id: &RecordId) -> Result<Vec<ProjectNote>> {
        let sql = format!(
            "SELECT {} FROM project_notes WHERE task_id = ?1 AND is_deleted = 0 ORDER BY {}",
            ProjectNote::COLUMNS.join(", "),
            ProjectNote::ORDER_BY
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![task_id], ProjectNote::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Insert the row, or overwrite every column of the existing one
    pub fn upsert<T: EntityRow>(&self, row: &T) -> Result<()> {
        let columns = T::COLUMNS;
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let assignments = columns
            .iter()
            .skip(1)
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT(id) DO UPDATE SET {assignments}",
            T::KIND.table_name(),
            columns.join(", "),
        );
        self.conn.execute(&sql, params_from_iter(row.to_values()))?;
        Ok(())
    }

    /// Highest live prompt position, if any prompt exists
    pub fn max_prompt_order(&self) -> Result<Option<i64>> {
        Ok(self.conn.query_row(
            "SELECT MAX(sort_order) FROM prompts WHERE is_deleted = 0",
            [],
            |row| row.get(0),
        )?)
    }

    /// Kind-erased [`Self::get`]
    pub fn get_record(&self, kind: EntityKind, id: &RecordId) -> Result<Option<Record>> {
        Ok(match kind {
            EntityKind::Task => self.get::<Task>(id)?.map(Record::from),
            EntityKind::ProjectNote => self.get::<ProjectNote>(id)?.map(Record::from),
            EntityKind::Note => self.get::<Note>(id)?.map(Record::from),
            EntityKind::Prompt => self.get::<Prompt>(id)?.map(Record::from),
        })
    }

    /// Kind-erased [`Self::list`]
    pub fn list_records(&self, kind: EntityKind) -> Result<Vec<Record>> {
        fn erase<T: EntityRow>(rows: Vec<T>) -> Vec<Record> {
            rows.into_iter().map(Into::into).collect()
        }
        Ok(match kind {
            EntityKind::Task => erase(self.list::<Task>()?),
            EntityKind::ProjectNote => erase(self.list::<ProjectNote>()?),
            EntityKind::Note => erase(self.list::<Note>()?),
            EntityKind::Prompt => erase(self.list::<Prompt>()?),
        })
    }

    /// Physically remove a row; returns whether one existed
    pub fn purge(&self, kind: EntityKind, id: &RecordId) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table_name());
        Ok(self.conn.execute(&sql, params![id])? > 0)
    }

    /// Kind-erased [`Self::upsert`]
    pub fn upsert_record(&self, record: &Record) -> Result<()> {
        match record {
            Record::Task(row) => self.upsert(row),
            Record::ProjectNote(row) => self.upsert(row),
            Record::Note(row) => self.upsert(row),
            Record::Prompt(row) => self.upsert(row),
        }
    }
}
