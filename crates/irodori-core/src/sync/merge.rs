//! Last-writer-wins merge of a pulled remote row into the local store

use crate::config::TombstonePolicy;
use crate::models::Record;

/// Outcome of merging one remote row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// No local row; store the remote one as live
    Insert(Record),
    /// Overwrite the local row with this value
    Update(Record),
    /// Local row already equals the merge result
    Unchanged,
    /// A retryable queue entry holds newer local intent for this record
    SkipPending,
    /// Local tombstone is at least as new as the remote row; its delete is
    /// queued again unless an entry (dormant) is already waiting
    KeepTombstone,
}

/// Decide how `remote` lands on `local`.
///
/// Payload comes from the side with the higher `updated_at`; ties with a
/// differing payload go to the remote. The merged row keeps the local
/// `created_at` and takes the larger `updated_at`.
pub fn merge(
    local: Option<&Record>,
    remote: &Record,
    has_pending: bool,
    policy: TombstonePolicy,
) -> MergeDecision {
    if has_pending {
        return MergeDecision::SkipPending;
    }

    let Some(local) = local else {
        let mut inserted = remote.clone();
        inserted.set_meta(remote.created_at(), remote.updated_at(), false);
        return MergeDecision::Insert(inserted);
    };

    if local.is_deleted()
        && policy == TombstonePolicy::KeepNewer
        && local.updated_at() >= remote.updated_at()
    {
        return MergeDecision::KeepTombstone;
    }

    let remote_wins = remote.updated_at() > local.updated_at()
        || (remote.updated_at() == local.updated_at() && !remote.payload_eq(local));

    let mut merged = if remote_wins {
        remote.clone()
    } else {
        local.clone()
    };
    merged.set_meta(
        local.created_at(),
        local.updated_at().max(remote.updated_at()),
        false,
    );

    if &merged == local {
        MergeDecision::Unchanged
    } else {
        MergeDecision::Update(merged)
    }
}
