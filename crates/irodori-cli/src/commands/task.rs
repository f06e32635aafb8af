use std::path::Path;

use irodori_core::models::{NewProjectNote, NewTask, TaskPatch};
use irodori_core::{EntityKind, TaskCategory};

use crate::cli::{SubnoteCommands, TaskCommands};
use crate::commands::common::{format_task_lines, open_store, resolve_content, resolve_id};
use crate::error::CliError;

pub fn run_task(command: TaskCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        TaskCommands::Add {
            title,
            description,
            category,
        } => run_task_add(&title, description, category.into(), db_path),
        TaskCommands::List {
            category,
            open,
            json,
        } => run_task_list(category.map(Into::into), open, json, db_path),
        TaskCommands::Update {
            id,
            title,
            description,
            clear_description,
            category,
        } => {
            let description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };
            let patch = TaskPatch {
                title,
                description,
                category: category.map(Into::into),
                is_done: None,
            };
            run_task_update(&id, patch, db_path)
        }
        TaskCommands::Done { id, undo } => run_task_update(
            &id,
            TaskPatch {
                is_done: Some(!undo),
                ..TaskPatch::default()
            },
            db_path,
        ),
        TaskCommands::Delete { id } => run_task_delete(&id, db_path),
    }
}

pub fn run_task_add(
    title_parts: &[String],
    description: Option<String>,
    category: TaskCategory,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = resolve_content(title_parts)?;
    let store = open_store(db_path)?;
    let task = store.create_task(NewTask {
        description,
        ..NewTask::new(title, category)
    })?;

    println!("{}", task.id);
    Ok(())
}

pub fn run_task_list(
    category: Option<TaskCategory>,
    open_only: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let tasks = store
        .list_tasks_with_notes()?
        .into_iter()
        .filter(|entry| category.map_or(true, |category| entry.task.category == category))
        .filter(|entry| !(open_only && entry.task.is_done))
        .collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
    } else if tasks.is_empty() {
        println!("No tasks.");
    } else {
        for line in format_task_lines(&tasks) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_task_update(id: &str, patch: TaskPatch, db_path: &Path) -> Result<(), CliError> {
    if patch.title.is_none()
        && patch.description.is_none()
        && patch.category.is_none()
        && patch.is_done.is_none()
    {
        return Err(CliError::NothingToUpdate);
    }

    let store = open_store(db_path)?;
    let id = resolve_id(&store, EntityKind::Task, id)?;
    let task = store
        .update_task(&id, patch)?
        .ok_or_else(|| CliError::NotFound {
            kind: "task",
            query: id.to_string(),
        })?;

    println!("Updated task {}", task.id);
    Ok(())
}

pub fn run_task_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let id = resolve_id(&store, EntityKind::Task, id)?;
    store.delete_task(&id)?;
    println!("Deleted task {id}");
    Ok(())
}

pub fn run_subnote(command: SubnoteCommands, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    match command {
        SubnoteCommands::Add { task_id, content } => {
            let content = resolve_content(&content)?;
            let task_id = resolve_id(&store, EntityKind::Task, &task_id)?;
            let note = store.create_project_note(NewProjectNote {
                id: None,
                task_id,
                content,
            })?;
            println!("{}", note.id);
        }
        SubnoteCommands::Update { id, content } => {
            let content = resolve_content(&content)?;
            let id = resolve_id(&store, EntityKind::ProjectNote, &id)?;
            store.update_project_note(&id, &content)?;
            println!("Updated task note {id}");
        }
        SubnoteCommands::Delete { id } => {
            let id = resolve_id(&store, EntityKind::ProjectNote, &id)?;
            store.delete_project_note(&id)?;
            println!("Deleted task note {id}");
        }
    }
    Ok(())
}
