use std::path::Path;

use irodori_core::models::{NewNote, NotePatch};
use irodori_core::EntityKind;

use crate::cli::NoteCommands;
use crate::commands::common::{format_note_lines, open_store, resolve_content, resolve_id};
use crate::error::CliError;

pub fn run_note(command: NoteCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        NoteCommands::Add { title, content } => run_note_add(&title, &content, db_path),
        NoteCommands::List { limit, json } => run_note_list(limit, json, db_path),
        NoteCommands::Update { id, title, content } => {
            run_note_update(&id, NotePatch { title, content }, db_path)
        }
        NoteCommands::Delete { id } => run_note_delete(&id, db_path),
    }
}

pub fn run_note_add(title: &str, content_parts: &[String], db_path: &Path) -> Result<(), CliError> {
    let content = resolve_content(content_parts)?;
    let store = open_store(db_path)?;
    let note = store.create_note(NewNote {
        id: None,
        title: title.to_string(),
        content,
    })?;

    println!("{}", note.id);
    Ok(())
}

pub fn run_note_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let mut notes = store.list_notes()?;
    notes.truncate(limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else if notes.is_empty() {
        println!("No notes.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_note_update(id: &str, patch: NotePatch, db_path: &Path) -> Result<(), CliError> {
    if patch.title.is_none() && patch.content.is_none() {
        return Err(CliError::NothingToUpdate);
    }

    let store = open_store(db_path)?;
    let id = resolve_id(&store, EntityKind::Note, id)?;
    store.update_note(&id, patch)?;
    println!("Updated note {id}");
    Ok(())
}

pub fn run_note_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let id = resolve_id(&store, EntityKind::Note, id)?;
    store.delete_note(&id)?;
    println!("Deleted note {id}");
    Ok(())
}
