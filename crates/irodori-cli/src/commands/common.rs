use std::env;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use irodori_core::models::TaskWithNotes;
use irodori_core::util::compact_text;
use irodori_core::{
    EntityKind, LocalStore, Note, Prompt, QueueEntry, Record, RecordId, Remote, RemoteConfig,
    SyncEngine, SyncSettings, Task,
};

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "IRODORI_DB_PATH";

/// Enough of a UUID v7 to get past its shared timestamp prefix
const SHORT_ID_LEN: usize = 18;

pub fn open_store(db_path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open(db_path)?)
}

pub fn sync_settings() -> Result<SyncSettings, CliError> {
    Ok(SyncSettings::from_env()?)
}

/// Remote endpoint from the stored setting, else from the environment
pub fn remote_config(store: &LocalStore) -> Result<Option<RemoteConfig>, CliError> {
    Ok(RemoteConfig::resolve(store.remote_url()?, |name| {
        env::var(name).ok()
    })?)
}

pub fn open_engine(store: LocalStore) -> Result<SyncEngine, CliError> {
    let settings = sync_settings()?;
    let config = remote_config(&store)?.ok_or(CliError::SyncNotConfigured)?;
    tracing::debug!(
        remote = config.url(),
        transport = config.transport_name(),
        "Using remote store"
    );
    let remote = Remote::from_config(&config, settings.call_timeout)?;
    Ok(SyncEngine::new(store, remote, settings))
}

pub const fn kind_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Task => "task",
        EntityKind::ProjectNote => "task note",
        EntityKind::Note => "note",
        EntityKind::Prompt => "prompt",
    }
}

/// Resolve a full id or a unique id prefix among live rows of `kind`
pub fn resolve_id(store: &LocalStore, kind: EntityKind, query: &str) -> Result<RecordId, CliError> {
    let query = normalize_identifier(query)?;
    let records = store.list_records(kind)?;

    if let Some(record) = records.iter().find(|record| record.id().as_str() == query) {
        return Ok(record.id().clone());
    }

    let matching_ids = records
        .iter()
        .map(Record::id)
        .filter(|id| id.as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matching_ids.as_slice() {
        [] => Err(CliError::NotFound {
            kind: kind_label(kind),
            query,
        }),
        [id] => Ok((*id).clone()),
        _ => {
            let options = matching_ids
                .iter()
                .take(3)
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &RecordId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = compact_text(text.lines().next().unwrap_or(""));

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_task_lines(tasks: &[TaskWithNotes]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    let mut lines = Vec::new();
    for TaskWithNotes {
        task,
        project_notes,
    } in tasks
    {
        lines.push(format_task_line(task, now_ms));
        for note in project_notes {
            lines.push(format!(
                "    - {:<18}  {}",
                short_id(&note.id),
                preview(&note.content, 60)
            ));
        }
    }
    lines
}

fn format_task_line(task: &Task, now_ms: i64) -> String {
    let done = if task.is_done { "x" } else { " " };
    let title = preview(&task.title, 40);
    let relative_time = format_relative_time(task.updated_at, now_ms);
    format!(
        "{:<18}  [{done}] {title:<40}  {:<10}  {relative_time}",
        short_id(&task.id),
        task.category.as_str()
    )
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let title = preview(&note.title, 30);
            let body = preview(&note.content, 40);
            let relative_time = format_relative_time(note.updated_at, now_ms);
            format!(
                "{:<18}  {title:<30}  {body:<40}  {relative_time}",
                short_id(&note.id)
            )
        })
        .collect()
}

pub fn format_prompt_lines(prompts: &[Prompt]) -> Vec<String> {
    prompts
        .iter()
        .map(|prompt| {
            format!(
                "{:>3}. {:<18}  {:<30}  {}",
                prompt.sort_order,
                short_id(&prompt.id),
                preview(&prompt.title, 30),
                preview(&prompt.content, 50)
            )
        })
        .collect()
}

pub fn format_queue_lines(entries: &[QueueEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "#{:<6} {}  {:<6}  {}={}  retries={}",
                entry.id,
                format_sync_timestamp(entry.created_at),
                entry.operation.as_str(),
                entry.kind.table_name(),
                entry.record_id,
                entry.retry_count
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Content from the arguments, else piped stdin, else `$EDITOR`
pub fn resolve_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_file_path();
    std::fs::write(&temp_file, "")?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("irodori-{}-{now}.md", std::process::id()))
}

/// Write `bytes` to `path`, creating missing directories, or to stdout
pub fn write_output(bytes: &[u8], path: Option<&Path>) -> Result<(), CliError> {
    let Some(path) = path else {
        io::stdout().write_all(bytes)?;
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("irodori")
        .join("irodori.db")
}
