//! Scheduler state shared with clients.

use serde::Serialize;

/// Whether a reconciliation cycle is running right now
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Reconciling,
}
