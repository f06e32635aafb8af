//! Ordered prompt model

use serde::{Deserialize, Serialize};

use super::{require_text, RecordId};
use crate::error::Result;

/// A reusable prompt; prompts are listed by their dense `sort_order`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: RecordId,
    pub title: String,
    pub content: String,
    pub sort_order: i64,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Input for creating a prompt; it is appended after the last live prompt
#[derive(Debug, Clone, Default)]
pub struct NewPrompt {
    pub id: Option<RecordId>,
    pub title: String,
    pub content: String,
}

/// Partial update for a prompt
#[derive(Debug, Clone, Default)]
pub struct PromptPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub sort_order: Option<i64>,
}

impl Prompt {
    pub fn create(input: NewPrompt, sort_order: i64, now: i64) -> Result<Self> {
        Ok(Self {
            id: input.id.unwrap_or_default(),
            title: require_text(&input.title, "prompt title")?,
            content: input.content.trim().to_string(),
            sort_order,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        })
    }

    pub fn apply(&mut self, patch: PromptPatch) -> Result<()> {
        if let Some(title) = patch.title {
            self.title = require_text(&title, "prompt title")?;
        }
        if let Some(content) = patch.content {
            self.content = content.trim().to_string();
        }
        if let Some(sort_order) = patch.sort_order {
            self.sort_order = sort_order;
        }
        Ok(())
    }
}
