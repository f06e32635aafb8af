//! Data models for Irodori

mod id;
mod note;
mod project_note;
mod prompt;
mod queue;
mod record;
mod sync_status;
mod task;

pub use id::RecordId;
pub use note::{NewNote, Note, NotePatch};
pub use project_note::{NewProjectNote, ProjectNote};
pub use prompt::{NewPrompt, Prompt, PromptPatch};
pub use queue::{QueueEntry, SyncOperation, DEFAULT_MAX_RETRIES};
pub use record::{EntityKind, Record};
pub use sync_status::{ChangeEvent, ChangeOrigin, SyncStatus};
pub use task::{NewTask, Task, TaskCategory, TaskPatch, TaskWithNotes};

use crate::error::{Error, Result};

/// Trim a required text field, rejecting blanks
fn require_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}
