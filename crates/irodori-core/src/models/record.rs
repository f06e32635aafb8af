//! Kind-erased view over every synchronized entity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Note, ProjectNote, Prompt, RecordId, Task};
use crate::error::{Error, Result};

/// The synchronized entity kinds, in pull order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Task,
    ProjectNote,
    Note,
    Prompt,
}

impl EntityKind {
    /// Every kind; parents come before children so a pulled project note
    /// finds its task already merged.
    pub const ALL: [Self; 4] = [Self::Task, Self::ProjectNote, Self::Note, Self::Prompt];

    /// Table name, shared by the local store, the queue and the SQL remote
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::ProjectNote => "project_notes",
            Self::Note => "notes",
            Self::Prompt => "prompts",
        }
    }

    /// REST collection segment under `/api/`
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::ProjectNote => "project-notes",
            Self::Note => "notes",
            Self::Prompt => "prompts",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table_name() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.table_name() == value || kind.collection() == value)
            .ok_or_else(|| Error::InvalidInput(format!("unknown entity kind: {value}")))
    }
}

/// One row of any entity kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Task(Task),
    ProjectNote(ProjectNote),
    Note(Note),
    Prompt(Prompt),
}

macro_rules! each_record {
    ($record:expr, $inner:ident => $body:expr) => {
        match $record {
            Record::Task($inner) => $body,
            Record::ProjectNote($inner) => $body,
            Record::Note($inner) => $body,
            Record::Prompt($inner) => $body,
        }
    };
}

impl Record {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Task(_) => EntityKind::Task,
            Self::ProjectNote(_) => EntityKind::ProjectNote,
            Self::Note(_) => EntityKind::Note,
            Self::Prompt(_) => EntityKind::Prompt,
        }
    }

    pub const fn id(&self) -> &RecordId {
        each_record!(self, r => &r.id)
    }

    pub const fn created_at(&self) -> i64 {
        each_record!(self, r => r.created_at)
    }

    pub const fn updated_at(&self) -> i64 {
        each_record!(self, r => r.updated_at)
    }

    pub const fn is_deleted(&self) -> bool {
        each_record!(self, r => r.is_deleted)
    }

    /// Overwrite the bookkeeping columns, leaving the payload alone
    pub fn set_meta(&mut self, created_at: i64, updated_at: i64, is_deleted: bool) {
        each_record!(self, r => {
            r.created_at = created_at;
            r.updated_at = updated_at;
            r.is_deleted = is_deleted;
        });
    }

    /// Whether both rows carry the same kind, id and payload fields.
    /// Timestamps and the tombstone flag are not compared.
    #[must_use]
    pub fn payload_eq(&self, other: &Self) -> bool {
        let mut left = self.clone();
        let mut right = other.clone();
        left.set_meta(0, 0, false);
        right.set_meta(0, 0, false);
        left == right
    }

    /// JSON body used for queue entries and REST requests
    pub fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a JSON body as a row of `kind`
    pub fn from_payload(kind: EntityKind, payload: serde_json::Value) -> Result<Self> {
        let record = match kind {
            EntityKind::Task => Self::Task(serde_json::from_value(payload)?),
            EntityKind::ProjectNote => Self::ProjectNote(serde_json::from_value(payload)?),
            EntityKind::Note => Self::Note(serde_json::from_value(payload)?),
            EntityKind::Prompt => Self::Prompt(serde_json::from_value(payload)?),
        };
        if !record.id().is_valid() {
            return Err(Error::InvalidInput(format!("{kind} row has an empty id")));
        }
        Ok(record)
    }
}

impl From<Task> for Record {
    fn from(value: Task) -> Self {
        Self::Task(value)
    }
}

impl From<ProjectNote> for Record {
    fn from(value: ProjectNote) -> Self {
        Self::ProjectNote(value)
    }
}

impl From<Note> for Record {
    fn from(value: Note) -> Self {
        Self::Note(value)
    }
}

impl From<Prompt> for Record {
    fn from(value: Prompt) -> Self {
        Self::Prompt(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNote, NewTask, TaskCategory};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_names() {
        assert_eq!(EntityKind::ProjectNote.table_name(), "project_notes");
        assert_eq!(EntityKind::ProjectNote.collection(), "project-notes");
        assert_eq!("project-notes".parse::<EntityKind>().unwrap(), EntityKind::ProjectNote);
        assert_eq!("prompts".parse::<EntityKind>().unwrap(), EntityKind::Prompt);
        assert_eq!(EntityKind::from_table_name("notes"), Some(EntityKind::Note));
        assert!("attachments".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_unknown_task_category_decodes_as_short_term() {
        let payload = serde_json::json!({
            "id": "t-1",
            "title": "plan trip",
            "description": null,
            "category": "someday",
            "is_done": false,
            "created_at": 1,
            "updated_at": 2,
        });

        let Record::Task(task) = Record::from_payload(EntityKind::Task, payload).unwrap() else {
            panic!("expected a task");
        };
        assert_eq!(task.category, TaskCategory::ShortTerm);
        assert_eq!(Record::Task(task).to_payload().unwrap()["category"], "short_term");
    }

    #[test]
    fn test_payload_roundtrip_keeps_fields() {
        let task = Task::create(NewTask::new("buy milk", TaskCategory::Immediate), 10).unwrap();
        let record = Record::from(task.clone());

        let payload = record.to_payload().unwrap();
        assert_eq!(payload["title"], "buy milk");
        assert_eq!(payload["category"], "immediate");

        let decoded = Record::from_payload(EntityKind::Task, payload).unwrap();
        assert_eq!(decoded, Record::Task(task));
    }

    #[test]
    fn test_from_payload_rejects_wrong_shape() {
        let note = Note::create(
            NewNote {
                title: "n".to_string(),
                ..NewNote::default()
            },
            1,
        )
        .unwrap();
        let payload = Record::from(note).to_payload().unwrap();
        assert!(Record::from_payload(EntityKind::Task, payload).is_err());
    }

    #[test]
    fn test_payload_eq_ignores_bookkeeping() {
        let task = Task::create(NewTask::new("a", TaskCategory::LongTerm), 1).unwrap();
        let left = Record::from(task.clone());
        let mut right = left.clone();
        right.set_meta(5, 99, true);
        assert!(left.payload_eq(&right));

        let mut changed = task;
        changed.is_done = true;
        assert!(!left.payload_eq(&Record::from(changed)));
    }
}
