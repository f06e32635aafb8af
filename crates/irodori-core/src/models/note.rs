//! Note model

use serde::{Deserialize, Serialize};

use super::{require_text, RecordId};
use crate::error::Result;

/// A free-standing note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: RecordId,
    pub title: String,
    /// Plain text content
    pub content: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
}

/// Input for creating a note
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub id: Option<RecordId>,
    pub title: String,
    pub content: String,
}

/// Partial update for a note
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl Note {
    pub fn create(input: NewNote, now: i64) -> Result<Self> {
        Ok(Self {
            id: input.id.unwrap_or_default(),
            title: require_text(&input.title, "note title")?,
            content: input.content.trim().to_string(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
        })
    }

    pub fn apply(&mut self, patch: NotePatch) -> Result<()> {
        if let Some(title) = patch.title {
            self.title = require_text(&title, "note title")?;
        }
        if let Some(content) = patch.content {
            self.content = content.trim().to_string();
        }
        Ok(())
    }

    /// Get first line of content as a preview, truncated to `max_len` characters
    #[must_use]
    pub fn content_preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}
