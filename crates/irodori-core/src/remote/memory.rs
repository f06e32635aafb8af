//! In-process canonical store for tests

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{RemoteAdapter, RemoteError, RemoteResult};
use crate::models::{EntityKind, Record, RecordId};

/// Canonical store kept in memory, with switchable reachability and
/// per-record rejection
#[derive(Default)]
pub struct MemoryRemote {
    rows: Mutex<BTreeMap<(EntityKind, RecordId), Record>>,
    offline: AtomicBool,
    rejected: Mutex<HashSet<RecordId>>,
    /// Failing calls left before the remote goes offline by itself
    fail_after: Mutex<Option<usize>>,
    /// Ids of accepted writes, in arrival order
    log: Mutex<Vec<RecordId>>,
    pub upserts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub pulls: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Refuse writes to this record with a `400`
    pub fn reject(&self, id: &RecordId) {
        self.rejected.lock().unwrap().insert(id.clone());
    }

    pub fn accept(&self, id: &RecordId) {
        self.rejected.lock().unwrap().remove(id);
    }

    /// Go offline after `calls` more successful writes
    pub fn go_offline_after(&self, calls: usize) {
        *self.fail_after.lock().unwrap() = Some(calls);
    }

    /// Seed a row directly, as another client would have
    pub fn insert(&self, record: Record) {
        let mut record = record;
        record.set_meta(record.created_at(), record.updated_at(), false);
        self.rows
            .lock()
            .unwrap()
            .insert((record.kind(), record.id().clone()), record);
    }

    pub fn get(&self, kind: EntityKind, id: &RecordId) -> Option<Record> {
        self.rows.lock().unwrap().get(&(kind, id.clone())).cloned()
    }

    pub fn rows(&self, kind: EntityKind) -> Vec<Record> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((row_kind, _), _)| *row_kind == kind)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn write_log(&self) -> Vec<RecordId> {
        self.log.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("memory remote is offline".into()));
        }
        Ok(())
    }

    fn check_write(&self, id: &RecordId) -> RemoteResult<()> {
        self.check_online()?;
        let mut fail_after = self.fail_after.lock().unwrap();
        if let Some(remaining) = fail_after.as_mut() {
            if *remaining == 0 {
                self.set_online(false);
                *fail_after = None;
                return Err(RemoteError::Unreachable("connection dropped".into()));
            }
            *remaining -= 1;
        }
        if self.rejected.lock().unwrap().contains(id) {
            return Err(RemoteError::Rejected {
                status: 400,
                message: format!("record {id} rejected"),
            });
        }
        Ok(())
    }
}

impl RemoteAdapter for MemoryRemote {
    async fn health_check(&self) -> bool {
        self.check_online().is_ok()
    }

    async fn pull_all(&self, kind: EntityKind) -> RemoteResult<Vec<Record>> {
        self.check_online()?;
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows(kind))
    }

    async fn upsert(&self, record: &Record) -> RemoteResult<()> {
        self.check_write(record.id())?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let key = (record.kind(), record.id().clone());
        let stale = rows
            .get(&key)
            .is_some_and(|existing| existing.updated_at() > record.updated_at());
        if !stale {
            let mut stored = record.clone();
            let created_at = rows.get(&key).map_or(record.created_at(), Record::created_at);
            stored.set_meta(created_at, record.updated_at(), false);
            rows.insert(key, stored);
        }
        self.log.lock().unwrap().push(record.id().clone());
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> RemoteResult<()> {
        self.check_write(id)?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().remove(&(kind, id.clone()));
        self.log.lock().unwrap().push(id.clone());
        Ok(())
    }
}
