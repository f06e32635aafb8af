//! Canonical rows behind the REST routes.
//!
//! Uses the same schema as client stores but never keeps tombstones: a
//! delete removes the row.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use irodori_core::db::{Database, SqliteEntityRepository};
use irodori_core::{EntityKind, Error, Record, RecordId, Result};

#[derive(Clone)]
pub struct CanonicalStore {
    db: Arc<Mutex<Database>>,
}

/// What a `PUT` did to the stored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replaced {
    Written(Record),
    /// The stored row is newer; it is returned unchanged
    Stale(Record),
}

impl CanonicalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_database(Database::open(path)?))
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Database("canonical store lock poisoned".to_string()))
    }

    pub fn list(&self, kind: EntityKind) -> Result<Vec<Record>> {
        let db = self.lock()?;
        SqliteEntityRepository::new(db.connection()).list_records(kind)
    }

    pub fn get(&self, kind: EntityKind, id: &RecordId) -> Result<Option<Record>> {
        let db = self.lock()?;
        SqliteEntityRepository::new(db.connection()).get_record(kind, id)
    }

    /// Insert a new row; `None` when the id is already taken
    pub fn create(&self, record: Record) -> Result<Option<Record>> {
        let db = self.lock()?;
        let repo = SqliteEntityRepository::new(db.connection());
        if repo.get_record(record.kind(), record.id())?.is_some() {
            return Ok(None);
        }
        let record = live(record);
        repo.upsert_record(&record)?;
        tracing::info!(
            table = record.kind().table_name(),
            record_id = %record.id(),
            "Created canonical row"
        );
        Ok(Some(record))
    }

    /// Last-write-wins replace; `None` when the row does not exist
    pub fn replace(&self, record: Record) -> Result<Option<Replaced>> {
        let db = self.lock()?;
        let repo = SqliteEntityRepository::new(db.connection());
        let Some(existing) = repo.get_record(record.kind(), record.id())? else {
            return Ok(None);
        };

        if record.updated_at() < existing.updated_at() {
            tracing::debug!(
                table = record.kind().table_name(),
                record_id = %record.id(),
                stored = existing.updated_at(),
                incoming = record.updated_at(),
                "Ignored stale write"
            );
            return Ok(Some(Replaced::Stale(existing)));
        }

        let mut record = record;
        record.set_meta(existing.created_at(), record.updated_at(), false);
        repo.upsert_record(&record)?;
        tracing::info!(
            table = record.kind().table_name(),
            record_id = %record.id(),
            "Updated canonical row"
        );
        Ok(Some(Replaced::Written(record)))
    }

    /// Physically delete a row; `false` when there was none
    pub fn remove(&self, kind: EntityKind, id: &RecordId) -> Result<bool> {
        let db = self.lock()?;
        let removed = SqliteEntityRepository::new(db.connection()).purge(kind, id)?;
        if removed {
            tracing::info!(table = kind.table_name(), record_id = %id, "Deleted canonical row");
        }
        Ok(removed)
    }
}

fn live(mut record: Record) -> Record {
    record.set_meta(record.created_at(), record.updated_at(), false);
    record
}

#[cfg(test)]
mod tests {
    use irodori_core::models::{NewNote, Note};
    use pretty_assertions::assert_eq;

    use super::*;

    fn note(title: &str, updated_at: i64) -> Record {
        let mut note = Note::create(
            NewNote {
                id: Some("note-1".parse().unwrap()),
                title: title.to_string(),
                content: String::new(),
            },
            100,
        )
        .unwrap();
        note.updated_at = updated_at;
        Record::from(note)
    }

    #[test]
    fn create_refuses_existing_id() {
        let store = CanonicalStore::open_in_memory().unwrap();
        assert!(store.create(note("first", 100)).unwrap().is_some());
        assert!(store.create(note("again", 200)).unwrap().is_none());
        assert_eq!(store.list(EntityKind::Note).unwrap().len(), 1);
    }

    #[test]
    fn replace_is_last_write_wins() {
        let store = CanonicalStore::open_in_memory().unwrap();
        assert!(store.replace(note("missing", 100)).unwrap().is_none());

        store.create(note("first", 200)).unwrap();
        let stale = store.replace(note("older", 150)).unwrap().unwrap();
        assert!(matches!(stale, Replaced::Stale(ref row) if row.updated_at() == 200));

        let written = store.replace(note("newer", 300)).unwrap().unwrap();
        let Replaced::Written(row) = written else {
            panic!("expected a write");
        };
        assert_eq!(row.created_at(), 100);

        let stored = store.get(EntityKind::Note, row.id()).unwrap().unwrap();
        let Record::Note(stored) = stored else {
            panic!("expected a note");
        };
        assert_eq!(stored.title, "newer");
    }

    #[test]
    fn remove_reports_missing_rows() {
        let store = CanonicalStore::open_in_memory().unwrap();
        let id: RecordId = "note-1".parse().unwrap();
        store.create(note("gone soon", 100)).unwrap();
        assert!(store.remove(EntityKind::Note, &id).unwrap());
        assert!(!store.remove(EntityKind::Note, &id).unwrap());
        assert!(store.get(EntityKind::Note, &id).unwrap().is_none());
    }
}
