//! Reconciliation between the local store and the canonical store.

mod engine;
pub mod merge;

pub use engine::{CycleOutcome, CycleReport, SchedulerHandle, SyncEngine};
pub use merge::{merge, MergeDecision};
