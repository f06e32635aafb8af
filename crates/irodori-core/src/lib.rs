//! irodori-core - offline-first sync engine for Irodori
//!
//! This crate contains the shared models, the local SQLite store with its
//! change queue, the remote transports, and the reconciliation engine used
//! by the CLI and the REST façade.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{ConfigError, RemoteConfig, SyncSettings, TombstonePolicy};
pub use error::{Error, Result};
pub use models::{
    ChangeEvent, ChangeOrigin, EntityKind, Note, ProjectNote, Prompt, QueueEntry, Record,
    RecordId, SyncStatus, Task, TaskCategory,
};
pub use remote::{Remote, RemoteAdapter, RemoteError};
pub use services::LocalStore;
pub use state::EngineState;
pub use sync::{CycleOutcome, CycleReport, SchedulerHandle, SyncEngine};
