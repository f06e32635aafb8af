//! Background reconciliation: pull every kind, merge, then drain the queue.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SyncSettings;
use crate::error::Result;
use crate::models::{EntityKind, QueueEntry, Record, SyncOperation, SyncStatus};
use crate::remote::{Remote, RemoteAdapter, RemoteError, RemoteResult};
use crate::services::LocalStore;
use crate::state::EngineState;
use crate::util::now_millis;

/// How a reconciliation cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Pull and drain ran to the end
    Completed,
    /// The health check failed; nothing was attempted
    Offline,
    /// Connectivity was lost part way through
    Aborted,
    /// Another cycle was already in flight
    AlreadyRunning,
}

/// Counts gathered during one cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Unix ms at which the cycle began
    pub started_at: i64,
    /// Remote rows received across all kinds
    pub pulled: usize,
    pub merged: usize,
    /// Remote rows skipped because a local change is still queued
    pub skipped: usize,
    /// Tombstones kept with their delete queued again
    pub requeued: usize,
    /// Kinds whose pull failed while the remote stayed reachable
    pub pull_failures: usize,
    pub pushed: usize,
    pub failed: usize,
}

impl CycleReport {
    fn new(outcome: CycleOutcome, started_at: i64) -> Self {
        Self {
            outcome,
            started_at,
            pulled: 0,
            merged: 0,
            skipped: 0,
            requeued: 0,
            pull_failures: 0,
            pushed: 0,
            failed: 0,
        }
    }
}

struct Inner<R> {
    store: LocalStore,
    remote: R,
    settings: SyncSettings,
    reconciling: AtomicBool,
    online: AtomicBool,
    wake: Notify,
}

/// Owns the remote handle, the scheduler state and the timer for one
/// process. Clones share the same engine.
pub struct SyncEngine<R = Remote> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for SyncEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Clears the reconciling flag when a cycle ends, however it ends
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: RemoteAdapter> SyncEngine<R> {
    pub fn new(store: LocalStore, remote: R, settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                settings,
                reconciling: AtomicBool::new(false),
                online: AtomicBool::new(false),
                wake: Notify::new(),
            }),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> EngineState {
        if self.inner.reconciling.load(Ordering::Acquire) {
            EngineState::Reconciling
        } else {
            EngineState::Idle
        }
    }

    /// Result of the most recent health check
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    pub fn status(&self) -> Result<SyncStatus> {
        let store = &self.inner.store;
        Ok(SyncStatus {
            online: self.is_online(),
            pending_count: store.pending_count()?,
            dormant_count: store.dormant_count(self.inner.settings.max_retries)?,
            last_sync_at: store.last_sync_at()?,
        })
    }

    /// Run a health check outside a cycle and record the result. While a
    /// cycle is running its last result is returned instead.
    pub async fn probe(&self) -> bool {
        if self
            .inner
            .reconciling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.is_online();
        }
        let _guard = CycleGuard(&self.inner.reconciling);
        self.check_health().await
    }

    /// Ask the background task for a cycle now. Triggers that arrive while
    /// a cycle runs collapse into a single follow-up cycle.
    pub fn trigger(&self) {
        self.inner.wake.notify_one();
    }

    /// Run one cycle. Only local store faults are returned as errors;
    /// remote failures are reflected in the report.
    pub async fn reconcile(&self) -> Result<CycleReport> {
        let started_at = now_millis();
        if self
            .inner
            .reconciling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync cycle already running");
            return Ok(CycleReport::new(CycleOutcome::AlreadyRunning, started_at));
        }
        let _guard = CycleGuard(&self.inner.reconciling);

        let mut report = CycleReport::new(CycleOutcome::Completed, started_at);
        if !self.check_health().await {
            report.outcome = CycleOutcome::Offline;
            return Ok(report);
        }

        if !self.pull(&mut report).await? {
            report.outcome = CycleOutcome::Aborted;
            return Ok(report);
        }
        if !self.drain(&mut report).await? {
            report.outcome = CycleOutcome::Aborted;
            return Ok(report);
        }

        if report.pull_failures == 0 {
            self.inner.store.set_last_sync_at(started_at)?;
        }
        tracing::info!(
            pulled = report.pulled,
            merged = report.merged,
            pushed = report.pushed,
            failed = report.failed,
            "Sync cycle completed"
        );
        Ok(report)
    }

    /// Pull and merge every kind; `false` when connectivity was lost
    async fn pull(&self, report: &mut CycleReport) -> Result<bool> {
        let settings = &self.inner.settings;
        for kind in EntityKind::ALL {
            match self.bounded(self.inner.remote.pull_all(kind)).await {
                Ok(rows) => {
                    report.pulled += rows.len();
                    let summary = self.inner.store.apply_remote_batch(
                        kind,
                        &rows,
                        settings.tombstone_policy,
                        settings.max_retries,
                    )?;
                    report.merged += summary.merged;
                    report.skipped += summary.skipped;
                    report.requeued += summary.requeued;
                }
                Err(error) => {
                    tracing::warn!(table = kind.table_name(), "Failed to pull remote rows: {error}");
                    report.pull_failures += 1;
                    if !self.check_health().await {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Replay retryable queue entries oldest first; `false` when
    /// connectivity was lost
    async fn drain(&self, report: &mut CycleReport) -> Result<bool> {
        let max_retries = self.inner.settings.max_retries;
        let entries = self.inner.store.pending_entries(max_retries)?;

        for entry in entries {
            match self.push(&entry).await {
                Ok(()) => {
                    self.inner.store.dequeue(entry.id)?;
                    tracing::info!(
                        table = entry.kind.table_name(),
                        record_id = %entry.record_id,
                        operation = %entry.operation,
                        entry_id = entry.id,
                        "Synced queued change"
                    );
                    report.pushed += 1;
                }
                Err(error) => {
                    self.inner.store.increment_retry(entry.id)?;
                    report.failed += 1;
                    let retry_count = entry.retry_count + 1;
                    if retry_count >= max_retries {
                        tracing::warn!(
                            table = entry.kind.table_name(),
                            record_id = %entry.record_id,
                            entry_id = entry.id,
                            retry_count,
                            "Queue entry is now dormant: {error}"
                        );
                    } else {
                        tracing::warn!(
                            table = entry.kind.table_name(),
                            record_id = %entry.record_id,
                            entry_id = entry.id,
                            retry_count,
                            "Failed to push queued change: {error}"
                        );
                    }
                    if !self.check_health().await {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    async fn push(&self, entry: &QueueEntry) -> RemoteResult<()> {
        let remote = &self.inner.remote;
        match entry.operation {
            SyncOperation::Delete => self.bounded(remote.delete(entry.kind, &entry.record_id)).await,
            SyncOperation::Create | SyncOperation::Update => {
                let payload = entry.payload.clone().ok_or_else(|| {
                    RemoteError::Protocol(format!("queue entry {} has no payload", entry.id))
                })?;
                let record = Record::from_payload(entry.kind, payload)
                    .map_err(|error| RemoteError::Protocol(error.to_string()))?;
                self.bounded(remote.upsert(&record)).await
            }
        }
    }

    /// Bound one remote call by the configured timeout
    async fn bounded<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        let limit = self.inner.settings.call_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(limit)))
    }

    async fn check_health(&self) -> bool {
        let limit = self.inner.settings.call_timeout;
        let online = tokio::time::timeout(limit, self.inner.remote.health_check())
            .await
            .unwrap_or(false);

        let was_online = self.inner.online.swap(online, Ordering::AcqRel);
        match (was_online, online) {
            (true, false) => tracing::warn!("Remote unreachable, sync paused"),
            (false, true) => tracing::info!("Remote reachable"),
            _ => {}
        }
        online
    }
}

impl<R: RemoteAdapter + 'static> SyncEngine<R> {
    /// Spawn the background task: one cycle right away, then one per
    /// interval tick or [`trigger`](Self::trigger).
    pub fn start(&self) -> SchedulerHandle {
        let engine = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.inner.settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                interval_secs = engine.inner.settings.interval.as_secs(),
                "Sync scheduler started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                    () = engine.inner.wake.notified() => {}
                }
                if let Err(error) = engine.reconcile().await {
                    tracing::error!("Sync cycle failed: {error}");
                }
            }
            tracing::info!("Sync scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to the background task. Dropping it also stops the task, after
/// the cycle in flight (if any) finishes.
pub struct SchedulerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the task and wait for it to exit
    pub async fn shutdown(self) {
        let Self { shutdown, task } = self;
        // The task may already be gone
        let _ = shutdown.send(());
        if let Err(error) = task.await {
            tracing::warn!("Sync scheduler task ended abnormally: {error}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
