//! Task model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{require_text, ProjectNote, RecordId};
use crate::error::Result;
use crate::util::normalize_text_option;

/// Board column a task lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "&'static str")]
pub enum TaskCategory {
    /// Things to finish this week; unknown categories land here
    #[default]
    ShortTerm,
    /// Longer-running goals
    LongTerm,
    /// Projects; these carry sub-notes
    Project,
    /// Do it now
    Immediate,
}

impl TaskCategory {
    pub const ALL: [Self; 4] = [Self::ShortTerm, Self::LongTerm, Self::Project, Self::Immediate];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
            Self::Project => "project",
            Self::Immediate => "immediate",
        }
    }

    /// Parse a stored or user-supplied category; unknown values fall back to
    /// `short_term`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim() {
            "long_term" => Self::LongTerm,
            "project" => Self::Project,
            "immediate" => Self::Immediate,
            _ => Self::ShortTerm,
        }
    }
}

impl From<String> for TaskCategory {
    fn from(value: String) -> Self {
        Self::parse_lossy(&value)
    }
}

impl From<TaskCategory> for &'static str {
    fn from(category: TaskCategory) -> Self {
        category.as_str()
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub description: Option<String>,
    pub category: TaskCategory,
    pub is_done: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    /// Pre-generated id; a UUID v7 is minted when absent
    pub id: Option<RecordId>,
    pub title: String,
    pub description: Option<String>,
    pub category: TaskCategory,
    pub is_done: bool,
}

impl NewTask {
    pub fn new(title: impl Into<String>, category: TaskCategory) -> Self {
        Self {
            title: title.into(),
            category,
            ..Self::default()
        }
    }
}

/// Partial update for a task. `None` leaves a field untouched;
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<TaskCategory>,
    pub is_done: Option<bool>,
}

impl Task {
    /// Build a fresh, live task stamped at `now`
    pub fn create(input: NewTask, now: i64) -> Result<Self> {
        Ok(Self {
            id: input.id.unwrap_or_default(),
            title: require_text(&input.title, "task title")?,
            description: normalize_text_option(input.description),
            category: input.category,
            is_done: input.is_done,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        })
    }

    /// Apply a patch in place, leaving timestamps to the caller
    pub fn apply(&mut self, patch: TaskPatch) -> Result<()> {
        if let Some(title) = patch.title {
            self.title = require_text(&title, "task title")?;
        }
        if let Some(description) = patch.description {
            self.description = normalize_text_option(description);
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(is_done) = patch.is_done {
            self.is_done = is_done;
        }
        Ok(())
    }
}

/// A task together with its live project notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskWithNotes {
    #[serde(flatten)]
    pub task: Task,
    pub project_notes: Vec<ProjectNote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_create_trims_and_mints_id() {
        let task = Task::create(
            NewTask {
                description: Some("  ".to_string()),
                ..NewTask::new("  buy milk ", TaskCategory::Immediate)
            },
            42,
        )
        .unwrap();

        assert_eq!(task.title, "buy milk");
        assert_eq!(task.description, None);
        assert!(task.id.is_valid());
        assert_eq!(task.created_at, 42);
        assert_eq!(task.updated_at, 42);
        assert!(!task.is_deleted);
    }

    #[test]
    fn test_task_create_rejects_blank_title() {
        assert!(Task::create(NewTask::new("   ", TaskCategory::ShortTerm), 1).is_err());
    }

    #[test]
    fn test_task_patch_clears_description() {
        let mut task = Task::create(
            NewTask {
                description: Some("details".to_string()),
                ..NewTask::new("title", TaskCategory::Project)
            },
            1,
        )
        .unwrap();

        task.apply(TaskPatch {
            description: Some(None),
            is_done: Some(true),
            ..TaskPatch::default()
        })
        .unwrap();

        assert_eq!(task.description, None);
        assert!(task.is_done);
        assert_eq!(task.title, "title");
    }

    #[test]
    fn test_category_parse_lossy() {
        assert_eq!(TaskCategory::parse_lossy("project"), TaskCategory::Project);
        assert_eq!(TaskCategory::parse_lossy("someday"), TaskCategory::ShortTerm);
        for category in TaskCategory::ALL {
            assert_eq!(TaskCategory::parse_lossy(category.as_str()), category);
        }
    }
}
