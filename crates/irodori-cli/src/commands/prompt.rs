use std::path::Path;

use irodori_core::models::{NewPrompt, PromptPatch};
use irodori_core::EntityKind;

use crate::cli::PromptCommands;
use crate::commands::common::{format_prompt_lines, open_store, resolve_content, resolve_id};
use crate::error::CliError;

pub fn run_prompt(command: PromptCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        PromptCommands::Add { title, content } => run_prompt_add(&title, &content, db_path),
        PromptCommands::List { json } => run_prompt_list(json, db_path),
        PromptCommands::Update { id, title, content } => run_prompt_update(
            &id,
            PromptPatch {
                title,
                content,
                sort_order: None,
            },
            db_path,
        ),
        PromptCommands::Delete { id } => run_prompt_delete(&id, db_path),
        PromptCommands::Reorder { ids } => run_prompt_reorder(&ids, db_path),
    }
}

pub fn run_prompt_add(
    title: &str,
    content_parts: &[String],
    db_path: &Path,
) -> Result<(), CliError> {
    let content = resolve_content(content_parts)?;
    let store = open_store(db_path)?;
    let prompt = store.create_prompt(NewPrompt {
        id: None,
        title: title.to_string(),
        content,
    })?;

    println!("{}", prompt.id);
    Ok(())
}

pub fn run_prompt_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let prompts = store.list_prompts()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&prompts)?);
    } else if prompts.is_empty() {
        println!("No prompts.");
    } else {
        for line in format_prompt_lines(&prompts) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn run_prompt_update(id: &str, patch: PromptPatch, db_path: &Path) -> Result<(), CliError> {
    if patch.title.is_none() && patch.content.is_none() {
        return Err(CliError::NothingToUpdate);
    }

    let store = open_store(db_path)?;
    let id = resolve_id(&store, EntityKind::Prompt, id)?;
    store.update_prompt(&id, patch)?;
    println!("Updated prompt {id}");
    Ok(())
}

pub fn run_prompt_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let id = resolve_id(&store, EntityKind::Prompt, id)?;
    store.delete_prompt(&id)?;
    println!("Deleted prompt {id}");
    Ok(())
}

pub fn run_prompt_reorder(ids: &[String], db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let ordered = ids
        .iter()
        .map(|id| resolve_id(&store, EntityKind::Prompt, id))
        .collect::<Result<Vec<_>, _>>()?;

    let prompts = store.reorder_prompts(&ordered)?;
    for line in format_prompt_lines(&prompts) {
        println!("{line}");
    }
    Ok(())
}
