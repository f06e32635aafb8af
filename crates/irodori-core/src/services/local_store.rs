//! Thread-safe local store used by every client and by the sync engine.
//!
//! Each mutation writes its row and its change-queue entry in one SQLite
//! transaction, then broadcasts a [`ChangeEvent`] once the commit succeeded.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Transaction;
use tokio::sync::broadcast;

use crate::config::TombstonePolicy;
use crate::db::{
    ChangeQueue, Database, SqliteChangeQueue, SqliteEntityRepository, SqliteSyncMetaRepository,
    SyncMetaRepository, LAST_SYNC_AT_KEY, REMOTE_URL_KEY,
};
use crate::error::{Error, Result};
use crate::models::{
    ChangeEvent, ChangeOrigin, EntityKind, NewNote, NewProjectNote, NewPrompt, NewTask, Note,
    NotePatch, ProjectNote, Prompt, PromptPatch, QueueEntry, Record, RecordId, SyncOperation,
    Task, TaskPatch, TaskWithNotes,
};
use crate::sync::merge::{merge, MergeDecision};
use crate::util::{next_timestamp, now_millis};

const EVENT_CAPACITY: usize = 256;

/// Counts from merging one pulled batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Rows inserted or updated locally
    pub merged: usize,
    pub unchanged: usize,
    /// Rows skipped because a retryable queue entry exists
    pub skipped: usize,
    /// Tombstones kept with their delete queued again
    pub requeued: usize,
}

/// Embedded store shared by the foreground mutation path and the
/// background reconciliation task. Cloning shares the same connection.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Opening local store");
        Ok(Self::from_database(Database::open(path)?))
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    fn from_database(db: Database) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db: Arc::new(Mutex::new(db)),
            events,
        }
    }

    /// Receive a notification after every committed change
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| Error::poisoned())
    }

    fn read<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<T>) -> Result<T> {
        let db = self.lock()?;
        f(db.connection())
    }

    /// Run `f` in one transaction; events are sent only after commit
    fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>, &mut Vec<ChangeEvent>) -> Result<T>,
    ) -> Result<T> {
        let mut events = Vec::new();
        let value = {
            let mut db = self.lock()?;
            let tx = db.connection_mut().transaction()?;
            let value = f(&tx, &mut events)?;
            tx.commit()?;
            value
        };
        for event in events {
            // No receivers is fine
            let _ = self.events.send(event);
        }
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    pub fn create_task(&self, input: NewTask) -> Result<Task> {
        let task = Task::create(input, now_millis())?;
        self.write(|tx, events| {
            reject_existing::<Task>(tx, &task.id)?;
            record_upsert(tx, events, &task, SyncOperation::Create)?;
            Ok(task)
        })
    }

    /// Returns `None` when the task does not exist or is deleted
    pub fn update_task(&self, id: &RecordId, patch: TaskPatch) -> Result<Option<Task>> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(mut task) = repo.get_live::<Task>(id)? else {
                return Ok(None);
            };
            task.apply(patch)?;
            task.updated_at = next_timestamp(task.updated_at);
            record_upsert(tx, events, &task, SyncOperation::Update)?;
            Ok(Some(task))
        })
    }

    /// Soft-delete a task together with its live project notes.
    /// Returns `false` when there was nothing to delete.
    pub fn delete_task(&self, id: &RecordId) -> Result<bool> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(task) = repo.get_live::<Task>(id)? else {
                return Ok(false);
            };
            for note in repo.list_project_notes(id)? {
                record_delete(tx, events, note)?;
            }
            record_delete(tx, events, task)?;
            Ok(true)
        })
    }

    pub fn get_task(&self, id: &RecordId) -> Result<Option<Task>> {
        self.read(|conn| SqliteEntityRepository::new(conn).get_live(id))
    }

    /// Live tasks, most recently updated first
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.read(|conn| SqliteEntityRepository::new(conn).list())
    }

    /// Live tasks with their live project notes attached
    pub fn list_tasks_with_notes(&self) -> Result<Vec<TaskWithNotes>> {
        self.read(|conn| {
            let repo = SqliteEntityRepository::new(conn);
            repo.list::<Task>()?
                .into_iter()
                .map(|task| {
                    let project_notes = repo.list_project_notes(&task.id)?;
                    Ok::<_, Error>(TaskWithNotes {
                        task,
                        project_notes,
                    })
                })
                .collect()
        })
    }

    // ------------------------------------------------------------------
    // Project notes
    // ------------------------------------------------------------------

    /// Attach a note to a live task
    pub fn create_project_note(&self, input: NewProjectNote) -> Result<ProjectNote> {
        let note = ProjectNote::create(input, now_millis())?;
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            if repo.get_live::<Task>(&note.task_id)?.is_none() {
                return Err(Error::NotFound(format!("task {}", note.task_id)));
            }
            reject_existing::<ProjectNote>(tx, &note.id)?;
            record_upsert(tx, events, &note, SyncOperation::Create)?;
            Ok(note)
        })
    }

    pub fn update_project_note(&self, id: &RecordId, content: &str) -> Result<Option<ProjectNote>> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(mut note) = repo.get_live::<ProjectNote>(id)? else {
                return Ok(None);
            };
            note.set_content(content)?;
            note.updated_at = next_timestamp(note.updated_at);
            record_upsert(tx, events, &note, SyncOperation::Update)?;
            Ok(Some(note))
        })
    }

    pub fn delete_project_note(&self, id: &RecordId) -> Result<bool> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(note) = repo.get_live::<ProjectNote>(id)? else {
                return Ok(false);
            };
            record_delete(tx, events, note)?;
            Ok(true)
        })
    }

    pub fn list_project_notes(&self, task_id: &RecordId) -> Result<Vec<ProjectNote>> {
        self.read(|conn| SqliteEntityRepository::new(conn).list_project_notes(task_id))
    }

    // ------------------------------------------------------------------
    // Notes
    // ------------------------------------------------------------------

    pub fn create_note(&self, input: NewNote) -> Result<Note> {
        let note = Note::create(input, now_millis())?;
        self.write(|tx, events| {
            reject_existing::<Note>(tx, &note.id)?;
            record_upsert(tx, events, &note, SyncOperation::Create)?;
            Ok(note)
        })
    }

    pub fn update_note(&self, id: &RecordId, patch: NotePatch) -> Result<Option<Note>> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(mut note) = repo.get_live::<Note>(id)? else {
                return Ok(None);
            };
            note.apply(patch)?;
            note.updated_at = next_timestamp(note.updated_at);
            record_upsert(tx, events, &note, SyncOperation::Update)?;
            Ok(Some(note))
        })
    }

    pub fn delete_note(&self, id: &RecordId) -> Result<bool> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(note) = repo.get_live::<Note>(id)? else {
                return Ok(false);
            };
            record_delete(tx, events, note)?;
            Ok(true)
        })
    }

    pub fn get_note(&self, id: &RecordId) -> Result<Option<Note>> {
        self.read(|conn| SqliteEntityRepository::new(conn).get_live(id))
    }

    pub fn list_notes(&self) -> Result<Vec<Note>> {
        self.read(|conn| SqliteEntityRepository::new(conn).list())
    }

    // ------------------------------------------------------------------
    // Prompts
    // ------------------------------------------------------------------

    /// Append a prompt after the last live one
    pub fn create_prompt(&self, input: NewPrompt) -> Result<Prompt> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let sort_order = repo.max_prompt_order()?.map_or(0, |max| max + 1);
            let prompt = Prompt::create(input, sort_order, now_millis())?;
            reject_existing::<Prompt>(tx, &prompt.id)?;
            record_upsert(tx, events, &prompt, SyncOperation::Create)?;
            Ok(prompt)
        })
    }

    /// Update a prompt's text. A `sort_order` in the patch is applied as-is;
    /// use [`Self::reorder_prompts`] to move prompts around.
    pub fn update_prompt(&self, id: &RecordId, patch: PromptPatch) -> Result<Option<Prompt>> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(mut prompt) = repo.get_live::<Prompt>(id)? else {
                return Ok(None);
            };
            prompt.apply(patch)?;
            prompt.updated_at = next_timestamp(prompt.updated_at);
            record_upsert(tx, events, &prompt, SyncOperation::Update)?;
            Ok(Some(prompt))
        })
    }

    /// Soft-delete a prompt and close the gap it leaves in the ordering
    pub fn delete_prompt(&self, id: &RecordId) -> Result<bool> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let Some(prompt) = repo.get_live::<Prompt>(id)? else {
                return Ok(false);
            };
            record_delete(tx, events, prompt)?;
            let remaining = repo.list::<Prompt>()?;
            renumber_prompts(tx, events, remaining)?;
            Ok(true)
        })
    }

    pub fn get_prompt(&self, id: &RecordId) -> Result<Option<Prompt>> {
        self.read(|conn| SqliteEntityRepository::new(conn).get_live(id))
    }

    /// Live prompts by position
    pub fn list_prompts(&self) -> Result<Vec<Prompt>> {
        self.read(|conn| SqliteEntityRepository::new(conn).list())
    }

    /// Move the given prompts to the front in the given order. Prompts not
    /// named keep their relative order after them. Only rows whose position
    /// changed are rewritten and queued.
    pub fn reorder_prompts(&self, ordered_ids: &[RecordId]) -> Result<Vec<Prompt>> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = ordered_ids.iter().find(|id| !seen.insert(*id)) {
            return Err(Error::InvalidInput(format!(
                "prompt {duplicate} listed more than once"
            )));
        }

        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let mut current = repo.list::<Prompt>()?;
            let mut ordered = Vec::with_capacity(current.len());
            for id in ordered_ids {
                let position = current
                    .iter()
                    .position(|prompt| &prompt.id == id)
                    .ok_or_else(|| Error::NotFound(format!("prompt {id}")))?;
                ordered.push(current.remove(position));
            }
            ordered.extend(current);
            renumber_prompts(tx, events, ordered)
        })
    }

    // ------------------------------------------------------------------
    // Kind-erased access
    // ------------------------------------------------------------------

    /// Fetch any row by kind and id, tombstones included
    pub fn get_record(&self, kind: EntityKind, id: &RecordId) -> Result<Option<Record>> {
        self.read(|conn| SqliteEntityRepository::new(conn).get_record(kind, id))
    }

    /// Live rows of one kind in their default order
    pub fn list_records(&self, kind: EntityKind) -> Result<Vec<Record>> {
        self.read(|conn| SqliteEntityRepository::new(conn).list_records(kind))
    }

    /// Merge a pulled batch of one kind in a single transaction
    pub fn apply_remote_batch(
        &self,
        kind: EntityKind,
        rows: &[Record],
        policy: TombstonePolicy,
        max_retries: u32,
    ) -> Result<MergeSummary> {
        self.write(|tx, events| {
            let repo = SqliteEntityRepository::new(tx);
            let queue = SqliteChangeQueue::new(tx);
            let mut summary = MergeSummary::default();

            for remote in rows {
                if remote.kind() != kind {
                    return Err(Error::InvalidInput(format!(
                        "{} row {} in a {kind} batch",
                        remote.kind(),
                        remote.id()
                    )));
                }
                let id = remote.id();
                let local = repo.get_record(kind, id)?;
                let pending = queue.has_active_entry(kind, id, max_retries)?;

                match merge(local.as_ref(), remote, pending, policy) {
                    MergeDecision::Insert(row) | MergeDecision::Update(row) => {
                        if local.as_ref().is_some_and(Record::is_deleted) {
                            drop_revived_delete(&queue, kind, id)?;
                        }
                        tracing::debug!(
                            table = kind.table_name(),
                            record_id = %id,
                            updated_at = row.updated_at(),
                            "Merged remote row"
                        );
                        repo.upsert_record(&row)?;
                        events.push(ChangeEvent {
                            kind,
                            id: id.clone(),
                            origin: ChangeOrigin::Remote,
                        });
                        summary.merged += 1;
                    }
                    MergeDecision::Unchanged => summary.unchanged += 1,
                    MergeDecision::SkipPending => {
                        tracing::debug!(
                            table = kind.table_name(),
                            record_id = %id,
                            "Skipped remote row with pending local change"
                        );
                        summary.skipped += 1;
                    }
                    // Any entry left here is dormant and waits for a manual retry
                    MergeDecision::KeepTombstone => {
                        if queue.entry_for(kind, id)?.is_none() {
                            queue.enqueue(kind, id, SyncOperation::Delete, None, now_millis())?;
                            tracing::debug!(
                                table = kind.table_name(),
                                record_id = %id,
                                "Kept newer tombstone, delete queued again"
                            );
                            summary.requeued += 1;
                        }
                    }
                }
            }
            Ok(summary)
        })
    }

    // ------------------------------------------------------------------
    // Change queue
    // ------------------------------------------------------------------

    /// Retryable entries, oldest first
    pub fn pending_entries(&self, max_retries: u32) -> Result<Vec<QueueEntry>> {
        self.read(|conn| SqliteChangeQueue::new(conn).list_pending(max_retries))
    }

    /// Entries past the retry ceiling, oldest first
    pub fn dormant_entries(&self, max_retries: u32) -> Result<Vec<QueueEntry>> {
        self.read(|conn| SqliteChangeQueue::new(conn).list_dormant(max_retries))
    }

    /// Every queued entry, dormant ones included
    pub fn pending_count(&self) -> Result<u64> {
        self.read(|conn| SqliteChangeQueue::new(conn).pending_count())
    }

    pub fn dormant_count(&self, max_retries: u32) -> Result<u64> {
        self.read(|conn| SqliteChangeQueue::new(conn).dormant_count(max_retries))
    }

    pub fn dequeue(&self, entry_id: i64) -> Result<()> {
        self.read(|conn| SqliteChangeQueue::new(conn).dequeue(entry_id))
    }

    pub fn increment_retry(&self, entry_id: i64) -> Result<()> {
        self.read(|conn| SqliteChangeQueue::new(conn).increment_retry(entry_id))
    }

    /// Make a dormant entry retryable again; `false` if it no longer exists
    pub fn revive_entry(&self, entry_id: i64) -> Result<bool> {
        let revived = self.read(|conn| SqliteChangeQueue::new(conn).revive(entry_id))?;
        if revived {
            tracing::info!(entry_id, "Revived queue entry");
        }
        Ok(revived)
    }

    // ------------------------------------------------------------------
    // Sync metadata
    // ------------------------------------------------------------------

    pub fn remote_url(&self) -> Result<Option<String>> {
        self.read(|conn| SqliteSyncMetaRepository::new(conn).get_value(REMOTE_URL_KEY))
    }

    /// Persist the remote endpoint; `None` removes it
    pub fn set_remote_url(&self, url: Option<&str>) -> Result<()> {
        self.read(|conn| {
            let repo = SqliteSyncMetaRepository::new(conn);
            match url.map(str::trim).filter(|url| !url.is_empty()) {
                Some(url) => repo.set_value(REMOTE_URL_KEY, url),
                None => repo.remove_value(REMOTE_URL_KEY),
            }
        })
    }

    pub fn last_sync_at(&self) -> Result<Option<i64>> {
        self.read(|conn| SqliteSyncMetaRepository::new(conn).last_sync_at())
    }

    pub fn set_last_sync_at(&self, timestamp: i64) -> Result<()> {
        self.read(|conn| {
            SqliteSyncMetaRepository::new(conn).set_value(LAST_SYNC_AT_KEY, &timestamp.to_string())
        })
    }
}

fn reject_existing<T: crate::db::EntityRow>(tx: &Transaction<'_>, id: &RecordId) -> Result<()> {
    if SqliteEntityRepository::new(tx).get::<T>(id)?.is_some() {
        return Err(Error::InvalidInput(format!(
            "{} {id} already exists",
            T::KIND
        )));
    }
    Ok(())
}

/// Write a live row and queue its upsert
fn record_upsert<T>(
    tx: &Transaction<'_>,
    events: &mut Vec<ChangeEvent>,
    row: &T,
    operation: SyncOperation,
) -> Result<()>
where
    T: crate::db::EntityRow + Clone,
{
    SqliteEntityRepository::new(tx).upsert(row)?;
    let record: Record = row.clone().into();
    let payload = record.to_payload()?;
    let entry_id = SqliteChangeQueue::new(tx).enqueue(
        T::KIND,
        record.id(),
        operation,
        Some(&payload),
        now_millis(),
    )?;
    tracing::info!(
        table = T::KIND.table_name(),
        record_id = %record.id(),
        operation = operation.as_str(),
        entry_id,
        "Recorded local change"
    );
    events.push(ChangeEvent {
        kind: T::KIND,
        id: record.id().clone(),
        origin: ChangeOrigin::Local,
    });
    Ok(())
}

/// A pull that revives a tombstone supersedes the dormant delete behind it
fn drop_revived_delete(
    queue: &SqliteChangeQueue<'_>,
    kind: EntityKind,
    id: &RecordId,
) -> Result<()> {
    let Some(entry) = queue.entry_for(kind, id)? else {
        return Ok(());
    };
    if entry.operation == SyncOperation::Delete {
        queue.dequeue(entry.id)?;
        tracing::warn!(
            table = kind.table_name(),
            record_id = %id,
            entry_id = entry.id,
            retry_count = entry.retry_count,
            "Dropped dormant delete of a record the remote still has"
        );
    }
    Ok(())
}

/// Tombstone a row and queue its delete
fn record_delete<T>(tx: &Transaction<'_>, events: &mut Vec<ChangeEvent>, row: T) -> Result<()>
where
    T: crate::db::EntityRow,
{
    let mut record: Record = row.into();
    let updated_at = next_timestamp(record.updated_at());
    record.set_meta(record.created_at(), updated_at, true);
    SqliteEntityRepository::new(tx).upsert_record(&record)?;
    let entry_id = SqliteChangeQueue::new(tx).enqueue(
        T::KIND,
        record.id(),
        SyncOperation::Delete,
        None,
        now_millis(),
    )?;
    tracing::info!(
        table = T::KIND.table_name(),
        record_id = %record.id(),
        operation = SyncOperation::Delete.as_str(),
        entry_id,
        "Recorded local change"
    );
    events.push(ChangeEvent {
        kind: T::KIND,
        id: record.id().clone(),
        origin: ChangeOrigin::Local,
    });
    Ok(())
}

/// Assign dense positions `0..n` in the given order, queueing changed rows
fn renumber_prompts(
    tx: &Transaction<'_>,
    events: &mut Vec<ChangeEvent>,
    ordered: Vec<Prompt>,
) -> Result<Vec<Prompt>> {
    let mut result = Vec::with_capacity(ordered.len());
    for (position, mut prompt) in (0_i64..).zip(ordered) {
        if prompt.sort_order != position {
            prompt.sort_order = position;
            prompt.updated_at = next_timestamp(prompt.updated_at);
            record_upsert(tx, events, &prompt, SyncOperation::Update)?;
        }
        result.push(prompt);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskCategory, DEFAULT_MAX_RETRIES};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn store() -> LocalStore {
        LocalStore::open_in_memory().unwrap()
    }

    fn new_prompt(title: &str) -> NewPrompt {
        NewPrompt {
            title: title.to_string(),
            content: format!("{title} body"),
            ..NewPrompt::default()
        }
    }

    #[test]
    fn test_create_task_is_visible_and_queued() {
        let store = store();
        let task = store
            .create_task(NewTask::new("buy milk", TaskCategory::ShortTerm))
            .unwrap();

        assert_eq!(store.list_tasks().unwrap(), vec![task.clone()]);
        let pending = store.pending_entries(DEFAULT_MAX_RETRIES).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, SyncOperation::Create);
        assert_eq!(pending[0].record_id, task.id);
        assert_eq!(pending[0].payload.as_ref().unwrap()["title"], "buy milk");
        assert_eq!(store.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_create_with_existing_id_is_rejected() {
        let store = store();
        let id = RecordId::new();
        let input = NewTask {
            id: Some(id.clone()),
            ..NewTask::new("one", TaskCategory::ShortTerm)
        };
        store.create_task(input.clone()).unwrap();
        assert!(matches!(store.create_task(input), Err(Error::InvalidInput(_))));
        assert_eq!(store.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_failed_mutation_leaves_no_queue_entry() {
        let store = store();
        assert!(store.create_task(NewTask::new("  ", TaskCategory::ShortTerm)).is_err());
        let task = store.create_task(NewTask::new("ok", TaskCategory::ShortTerm)).unwrap();
        let result = store.update_task(
            &task.id,
            TaskPatch {
                title: Some(String::new()),
                ..TaskPatch::default()
            },
        );
        assert!(result.is_err());
        let pending = store.pending_entries(DEFAULT_MAX_RETRIES).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, SyncOperation::Create);
        assert_eq!(store.get_task(&task.id).unwrap().unwrap().title, "ok");
    }

    #[test]
    fn test_edit_edit_delete_coalesces_to_delete() {
        let store = store();
        let task = store.create_task(NewTask::new("a", TaskCategory::LongTerm)).unwrap();
        for title in ["b", "c"] {
            store
                .update_task(
                    &task.id,
                    TaskPatch {
                        title: Some(title.to_string()),
                        ..TaskPatch::default()
                    },
                )
                .unwrap()
                .unwrap();
        }
        assert!(store.delete_task(&task.id).unwrap());

        let pending = store.pending_entries(DEFAULT_MAX_RETRIES).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, SyncOperation::Delete);
        assert_eq!(pending[0].payload, None);
        assert!(store.list_tasks().unwrap().is_empty());

        let tombstone = store.get_record(EntityKind::Task, &task.id).unwrap().unwrap();
        assert!(tombstone.is_deleted());
    }

    #[test]
    fn test_update_missing_returns_none() {
        let store = store();
        let missing = RecordId::new();
        assert_eq!(store.update_task(&missing, TaskPatch::default()).unwrap(), None);
        assert_eq!(store.update_note(&missing, NotePatch::default()).unwrap(), None);
        assert!(!store.delete_prompt(&missing).unwrap());
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[test]
    fn test_updated_at_strictly_increases() {
        let store = store();
        let task = store.create_task(NewTask::new("t", TaskCategory::Immediate)).unwrap();
        let mut previous = task.updated_at;
        for _ in 0..5 {
            let updated = store
                .update_task(
                    &task.id,
                    TaskPatch {
                        is_done: Some(true),
                        ..TaskPatch::default()
                    },
                )
                .unwrap()
                .unwrap();
            assert!(updated.updated_at > previous);
            assert_eq!(updated.created_at, task.created_at);
            previous = updated.updated_at;
        }
        store.delete_task(&task.id).unwrap();
        let tombstone = store.get_record(EntityKind::Task, &task.id).unwrap().unwrap();
        assert!(tombstone.updated_at() > previous);
    }

    #[test]
    fn test_delete_task_cascades_to_project_notes() {
        let store = store();
        let task = store.create_task(NewTask::new("p", TaskCategory::Project)).unwrap();
        let note = store
            .create_project_note(NewProjectNote {
                id: None,
                task_id: task.id.clone(),
                content: "sub".to_string(),
            })
            .unwrap();

        let with_notes = store.list_tasks_with_notes().unwrap();
        assert_eq!(with_notes[0].project_notes, vec![note.clone()]);

        assert!(store.delete_task(&task.id).unwrap());
        assert!(store.list_project_notes(&task.id).unwrap().is_empty());

        let pending = store.pending_entries(DEFAULT_MAX_RETRIES).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|e| e.operation == SyncOperation::Delete));
        assert!(pending
            .iter()
            .any(|e| e.kind == EntityKind::ProjectNote && e.record_id == note.id));
    }

    #[test]
    fn test_project_note_requires_live_parent() {
        let store = store();
        let result = store.create_project_note(NewProjectNote {
            id: None,
            task_id: RecordId::new(),
            content: "orphan".to_string(),
        });
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_prompts_append_and_reorder() {
        let store = store();
        let a = store.create_prompt(new_prompt("a")).unwrap();
        let b = store.create_prompt(new_prompt("b")).unwrap();
        let c = store.create_prompt(new_prompt("c")).unwrap();
        assert_eq!((a.sort_order, b.sort_order, c.sort_order), (0, 1, 2));

        let reordered = store.reorder_prompts(&[c.id.clone(), a.id.clone()]).unwrap();
        let titles: Vec<_> = reordered.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
        let orders: Vec<_> = store
            .list_prompts()
            .unwrap()
            .iter()
            .map(|p| (p.title.clone(), p.sort_order))
            .collect();
        assert_eq!(
            orders,
            vec![("c".to_string(), 0), ("a".to_string(), 1), ("b".to_string(), 2)]
        );
        // One coalesced entry per prompt
        assert_eq!(store.pending_count().unwrap(), 3);
    }

    #[test]
    fn test_reorder_rejects_unknown_or_duplicate_ids() {
        let store = store();
        let a = store.create_prompt(new_prompt("a")).unwrap();
        assert!(matches!(
            store.reorder_prompts(&[RecordId::new()]),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.reorder_prompts(&[a.id.clone(), a.id.clone()]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_delete_prompt_keeps_order_dense() {
        let store = store();
        let a = store.create_prompt(new_prompt("a")).unwrap();
        store.create_prompt(new_prompt("b")).unwrap();
        store.create_prompt(new_prompt("c")).unwrap();

        assert!(store.delete_prompt(&a.id).unwrap());
        let orders: Vec<_> = store.list_prompts().unwrap().iter().map(|p| p.sort_order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_events_follow_commits() {
        let store = store();
        let mut events = store.subscribe();

        let note = store
            .create_note(NewNote {
                title: "n".to_string(),
                ..NewNote::default()
            })
            .unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            ChangeEvent {
                kind: EntityKind::Note,
                id: note.id.clone(),
                origin: ChangeOrigin::Local,
            }
        );

        // A rejected mutation emits nothing
        assert!(store
            .update_note(
                &note.id,
                NotePatch {
                    title: Some(" ".to_string()),
                    ..NotePatch::default()
                }
            )
            .is_err());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_apply_remote_batch_skips_pending_and_counts() {
        let store = store();
        let local = store.create_task(NewTask::new("mine", TaskCategory::ShortTerm)).unwrap();

        let mut remote_copy = local.clone();
        remote_copy.title = "theirs".to_string();
        remote_copy.updated_at += 1_000;
        let fresh = Task::create(NewTask::new("new remote", TaskCategory::LongTerm), 5).unwrap();

        let mut events = store.subscribe();
        let summary = store
            .apply_remote_batch(
                EntityKind::Task,
                &[Record::from(remote_copy), Record::from(fresh.clone())],
                TombstonePolicy::Revive,
                DEFAULT_MAX_RETRIES,
            )
            .unwrap();

        assert_eq!(
            summary,
            MergeSummary {
                merged: 1,
                unchanged: 0,
                skipped: 1,
                requeued: 0
            }
        );
        assert_eq!(store.get_task(&local.id).unwrap().unwrap().title, "mine");
        assert_eq!(store.get_task(&fresh.id).unwrap().unwrap(), fresh);
        assert_eq!(events.try_recv().unwrap().origin, ChangeOrigin::Remote);
    }

    #[test]
    fn test_apply_remote_batch_rejects_mixed_kinds() {
        let store = store();
        let note = Note::create(
            NewNote {
                title: "n".to_string(),
                ..NewNote::default()
            },
            1,
        )
        .unwrap();
        let result = store.apply_remote_batch(
            EntityKind::Task,
            &[Record::from(note)],
            TombstonePolicy::Revive,
            DEFAULT_MAX_RETRIES,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_meta_roundtrip_and_persistence() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("irodori.db");
        {
            let store = LocalStore::open(&path).unwrap();
            store.set_remote_url(Some(" http://localhost:3456 ")).unwrap();
            store.set_last_sync_at(1_234).unwrap();
            store.create_task(NewTask::new("persisted", TaskCategory::ShortTerm)).unwrap();
        }

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.remote_url().unwrap().as_deref(), Some("http://localhost:3456"));
        assert_eq!(store.last_sync_at().unwrap(), Some(1_234));
        assert_eq!(store.list_tasks().unwrap().len(), 1);
        assert_eq!(store.pending_count().unwrap(), 1);

        store.set_remote_url(None).unwrap();
        assert_eq!(store.remote_url().unwrap(), None);
    }
}
