use std::path::PathBuf;

use clap::Parser;
use irodori_core::models::{NewNote, NewPrompt, NewTask, TaskPatch};
use irodori_core::{
    CycleOutcome, CycleReport, EntityKind, LocalStore, RecordId, SyncStatus, TaskCategory,
};
use pretty_assertions::assert_eq;

use crate::cli::{CategoryArg, Cli, Commands, CompletionShell, SyncCommands, TaskCommands};
use crate::commands::common::{
    default_editor, format_queue_lines, format_relative_time, format_sync_timestamp,
    normalize_content, normalize_identifier, preview, resolve_db_path, resolve_id, short_id,
};
use crate::commands::completions::{completion_script, run_completions};
use crate::commands::prompt::run_prompt_reorder;
use crate::commands::sync::{describe_cycle, run_sync_retry};
use crate::commands::task::{run_task_delete, run_task_update};
use crate::error::CliError;

fn temp_db() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("irodori.db");
    (dir, path)
}

fn record_id(value: &str) -> RecordId {
    value.parse().unwrap()
}

fn report(outcome: CycleOutcome, failed: usize) -> CycleReport {
    CycleReport {
        outcome,
        started_at: 0,
        pulled: 4,
        merged: 2,
        skipped: 0,
        requeued: 0,
        pull_failures: 0,
        pushed: 3,
        failed,
    }
}

fn status(pending_count: u64) -> SyncStatus {
    SyncStatus {
        online: true,
        pending_count,
        dormant_count: 0,
        last_sync_at: None,
    }
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn normalize_identifier_rejects_blank_input() {
    assert_eq!(normalize_identifier("  abc ").unwrap(), "abc");
    assert!(matches!(normalize_identifier("   "), Err(CliError::EmptyId)));
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn format_sync_timestamp_renders_utc() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn preview_uses_first_line_and_truncates() {
    assert_eq!(preview("short\nsecond line", 20), "short");
    assert_eq!(preview("abcdefghijkl", 8), "abcde...");
}

#[test]
fn short_id_keeps_a_fixed_prefix() {
    let id = record_id("0190a2b4-1c3d-7e5f-8a9b-0c1d2e3f4a5b");
    assert_eq!(short_id(&id), "0190a2b4-1c3d-7e5f");
}

#[test]
fn category_arg_maps_to_task_category() {
    assert_eq!(TaskCategory::from(CategoryArg::ShortTerm), TaskCategory::ShortTerm);
    assert_eq!(TaskCategory::from(CategoryArg::LongTerm), TaskCategory::LongTerm);
    assert_eq!(TaskCategory::from(CategoryArg::Project), TaskCategory::Project);
    assert_eq!(TaskCategory::from(CategoryArg::Immediate), TaskCategory::Immediate);
}

#[test]
fn cli_parses_task_add_with_category() {
    let cli =
        Cli::try_parse_from(["irodori", "task", "add", "write", "report", "-c", "project"])
            .unwrap();
    match cli.command {
        Commands::Task {
            command:
                TaskCommands::Add {
                    title, category, ..
                },
        } => {
            assert_eq!(title, vec!["write".to_string(), "report".to_string()]);
            assert_eq!(category, CategoryArg::Project);
        }
        _ => panic!("expected task add"),
    }
}

#[test]
fn bare_sync_parses_without_subcommand() {
    let cli = Cli::try_parse_from(["irodori", "sync"]).unwrap();
    assert!(matches!(cli.command, Commands::Sync { command: None }));

    let cli = Cli::try_parse_from(["irodori", "sync", "retry", "7"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Sync {
            command: Some(SyncCommands::Retry { entry_id: 7 })
        }
    ));
}

#[test]
fn resolve_db_path_prefers_flag() {
    let path = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(path.clone())), path);
}

#[test]
fn resolve_id_matches_exact_and_unique_prefix() {
    let store = LocalStore::open_in_memory().unwrap();
    let note = store
        .create_note(NewNote {
            id: Some(record_id("aaa-111")),
            title: "Groceries".to_string(),
            content: "milk".to_string(),
        })
        .unwrap();
    store
        .create_note(NewNote {
            id: Some(record_id("bbb-222")),
            title: "Ideas".to_string(),
            content: "more".to_string(),
        })
        .unwrap();

    assert_eq!(resolve_id(&store, EntityKind::Note, "aaa-111").unwrap(), note.id);
    assert_eq!(resolve_id(&store, EntityKind::Note, " aa ").unwrap(), note.id);
}

#[test]
fn resolve_id_reports_ambiguous_and_missing_prefixes() {
    let store = LocalStore::open_in_memory().unwrap();
    for id in ["abc-1", "abc-2"] {
        store
            .create_note(NewNote {
                id: Some(record_id(id)),
                title: "t".to_string(),
                content: "c".to_string(),
            })
            .unwrap();
    }

    assert!(matches!(
        resolve_id(&store, EntityKind::Note, "abc"),
        Err(CliError::AmbiguousId(_))
    ));
    assert!(matches!(
        resolve_id(&store, EntityKind::Note, "zzz"),
        Err(CliError::NotFound { kind: "note", .. })
    ));
    // Ids of another kind never match
    assert!(matches!(
        resolve_id(&store, EntityKind::Task, "abc-1"),
        Err(CliError::NotFound { kind: "task", .. })
    ));
}

#[test]
fn task_update_and_delete_go_through_the_store() {
    let (_dir, db_path) = temp_db();
    let task = {
        let store = LocalStore::open(&db_path).unwrap();
        store
            .create_task(NewTask::new("Draft plan", TaskCategory::ShortTerm))
            .unwrap()
    };

    run_task_update(
        task.id.as_str(),
        TaskPatch {
            is_done: Some(true),
            ..TaskPatch::default()
        },
        &db_path,
    )
    .unwrap();
    {
        let store = LocalStore::open(&db_path).unwrap();
        assert!(store.get_task(&task.id).unwrap().unwrap().is_done);
    }

    run_task_delete(task.id.as_str(), &db_path).unwrap();
    let store = LocalStore::open(&db_path).unwrap();
    assert!(store.get_task(&task.id).unwrap().is_none());
    assert!(store.pending_count().unwrap() > 0);
}

#[test]
fn task_update_without_changes_is_rejected() {
    let (_dir, db_path) = temp_db();
    assert!(matches!(
        run_task_update("anything", TaskPatch::default(), &db_path),
        Err(CliError::NothingToUpdate)
    ));
}

#[test]
fn prompt_reorder_accepts_id_prefixes() {
    let (_dir, db_path) = temp_db();
    let (first, second) = {
        let store = LocalStore::open(&db_path).unwrap();
        let first = store
            .create_prompt(NewPrompt {
                id: Some(record_id("p-first")),
                title: "Review".to_string(),
                content: "Review this diff".to_string(),
            })
            .unwrap();
        let second = store
            .create_prompt(NewPrompt {
                id: Some(record_id("p-second")),
                title: "Summarize".to_string(),
                content: "Summarize the thread".to_string(),
            })
            .unwrap();
        (first, second)
    };

    run_prompt_reorder(&["p-s".to_string(), "p-f".to_string()], &db_path).unwrap();

    let store = LocalStore::open(&db_path).unwrap();
    let ids = store
        .list_prompts()
        .unwrap()
        .into_iter()
        .map(|prompt| prompt.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[test]
fn sync_retry_of_unknown_entry_fails() {
    let (_dir, db_path) = temp_db();
    assert!(matches!(
        run_sync_retry(42, &db_path),
        Err(CliError::QueueEntryNotFound(42))
    ));
}

#[test]
fn queue_lines_show_operation_and_table() {
    let store = LocalStore::open_in_memory().unwrap();
    store
        .create_note(NewNote {
            id: Some(record_id("n-1")),
            title: "t".to_string(),
            content: "c".to_string(),
        })
        .unwrap();

    let entries = store.pending_entries(3).unwrap();
    let lines = format_queue_lines(&entries);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("create"));
    assert!(lines[0].contains("notes=n-1"));
    assert!(lines[0].contains("retries=0"));
}

#[test]
fn describe_cycle_summarizes_each_outcome() {
    assert_eq!(
        describe_cycle(&report(CycleOutcome::Completed, 0), &status(0)),
        "Sync completed: pulled 4, merged 2, pushed 3"
    );
    assert_eq!(
        describe_cycle(&report(CycleOutcome::Completed, 1), &status(1)),
        "Sync completed with 1 failed change(s); 1 still queued"
    );
    assert_eq!(
        describe_cycle(&report(CycleOutcome::Offline, 0), &status(5)),
        "Remote unreachable; 5 change(s) remain queued"
    );
    assert_eq!(
        describe_cycle(&report(CycleOutcome::AlreadyRunning, 0), &status(0)),
        "A sync cycle is already running"
    );
}

#[test]
fn run_completions_writes_bash_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("completions").join("irodori.bash");

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_irodori()"));
}

#[test]
fn completion_scripts_name_the_binary() {
    let zsh = String::from_utf8(completion_script(CompletionShell::Zsh)).unwrap();
    assert!(zsh.contains("#compdef irodori"));

    let fish = String::from_utf8(completion_script(CompletionShell::Fish)).unwrap();
    assert!(fish.contains("complete -c irodori"));
    assert!(fish.contains("set-remote"));
}
