//! Outbound change queue entries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{EntityKind, RecordId};
use crate::error::{Error, Result};

/// Retry ceiling after which an entry turns dormant
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// What a queued entry asks the remote store to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown sync operation: {other}"))),
        }
    }
}

/// A pending outbound mutation. At most one exists per `(kind, record_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    /// Auto-increment id, used to dequeue exactly this entry
    pub id: i64,
    pub kind: EntityKind,
    pub record_id: RecordId,
    pub operation: SyncOperation,
    /// Full row snapshot for create/update; `None` for deletes
    pub payload: Option<serde_json::Value>,
    /// Enqueue time (Unix ms)
    pub created_at: i64,
    pub retry_count: u32,
}

impl QueueEntry {
    /// Whether the entry has hit the retry ceiling and is no longer retried
    #[must_use]
    pub const fn is_dormant(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }
}
