//! Project note (sub-note) model

use serde::{Deserialize, Serialize};

use super::{require_text, RecordId};
use crate::error::Result;

/// A note attached to a project task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectNote {
    pub id: RecordId,
    /// Parent task
    pub task_id: RecordId,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Input for creating a project note
#[derive(Debug, Clone)]
pub struct NewProjectNote {
    pub id: Option<RecordId>,
    pub task_id: RecordId,
    pub content: String,
}

impl ProjectNote {
    pub fn create(input: NewProjectNote, now: i64) -> Result<Self> {
        Ok(Self {
            id: input.id.unwrap_or_default(),
            task_id: input.task_id,
            content: require_text(&input.content, "project note content")?,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        })
    }

    pub fn set_content(&mut self, content: &str) -> Result<()> {
        self.content = require_text(content, "project note content")?;
        Ok(())
    }
}
