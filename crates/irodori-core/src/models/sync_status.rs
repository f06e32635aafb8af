//! Observable sync state and change notifications

use serde::Serialize;

use super::{EntityKind, RecordId};

/// Summary shown by the sync indicator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Result of the most recent reachability check
    pub online: bool,
    /// Every queued entry, dormant ones included
    pub pending_count: u64,
    /// Entries past the retry ceiling
    pub dormant_count: u64,
    /// Start time of the last fully successful cycle (Unix ms)
    pub last_sync_at: Option<i64>,
}

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    /// A local mutation
    Local,
    /// A merge of a pulled remote row
    Remote,
}

/// Emitted after each committed local mutation and each merge that wrote a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub id: RecordId,
    pub origin: ChangeOrigin,
}
