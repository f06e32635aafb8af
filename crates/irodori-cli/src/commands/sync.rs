use std::path::Path;

use irodori_core::{ChangeOrigin, CycleOutcome, CycleReport, SyncStatus};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::SyncCommands;
use crate::commands::common::{
    format_queue_lines, format_sync_timestamp, kind_label, open_engine, open_store,
    remote_config, short_id, sync_settings,
};
use crate::error::CliError;

pub async fn run_sync(command: Option<SyncCommands>, db_path: &Path) -> Result<(), CliError> {
    match command {
        None => run_sync_now(false, db_path).await,
        Some(SyncCommands::Now { json }) => run_sync_now(json, db_path).await,
        Some(SyncCommands::Status { json }) => run_sync_status(json, db_path).await,
        Some(SyncCommands::Dormant { json }) => run_sync_dormant(json, db_path),
        Some(SyncCommands::Retry { entry_id }) => run_sync_retry(entry_id, db_path),
        Some(SyncCommands::Watch) => run_sync_watch(db_path).await,
    }
}

pub async fn run_sync_now(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(open_store(db_path)?)?;
    let report = engine.reconcile().await?;
    let status = engine.status()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", describe_cycle(&report, &status));
    }
    Ok(())
}

pub fn describe_cycle(report: &CycleReport, status: &SyncStatus) -> String {
    match report.outcome {
        CycleOutcome::Completed if report.failed == 0 => format!(
            "Sync completed: pulled {}, merged {}, pushed {}",
            report.pulled, report.merged, report.pushed
        ),
        CycleOutcome::Completed => format!(
            "Sync completed with {} failed change(s); {} still queued",
            report.failed, status.pending_count
        ),
        CycleOutcome::Offline => format!(
            "Remote unreachable; {} change(s) remain queued",
            status.pending_count
        ),
        CycleOutcome::Aborted => format!(
            "Connection lost during sync; {} change(s) remain queued",
            status.pending_count
        ),
        CycleOutcome::AlreadyRunning => "A sync cycle is already running".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    remote: Option<String>,
    transport: Option<&'static str>,
    #[serde(flatten)]
    status: SyncStatus,
}

pub async fn run_sync_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let config = remote_config(&store)?;

    let status = if config.is_some() {
        let engine = open_engine(store)?;
        engine.probe().await;
        engine.status()?
    } else {
        let settings = sync_settings()?;
        SyncStatus {
            online: false,
            pending_count: store.pending_count()?,
            dormant_count: store.dormant_count(settings.max_retries)?,
            last_sync_at: store.last_sync_at()?,
        }
    };

    let output = StatusOutput {
        remote: config.as_ref().map(|config| config.url().to_string()),
        transport: config.as_ref().map(|config| config.transport_name()),
        status,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match (&output.remote, output.transport) {
        (Some(remote), Some(transport)) => println!("Remote:    {remote} ({transport})"),
        _ => println!("Remote:    not configured"),
    }
    println!(
        "Online:    {}",
        if output.status.online { "yes" } else { "no" }
    );
    println!("Pending:   {}", output.status.pending_count);
    println!("Dormant:   {}", output.status.dormant_count);
    println!(
        "Last sync: {}",
        output
            .status
            .last_sync_at
            .map_or_else(|| "never".to_string(), format_sync_timestamp)
    );
    Ok(())
}

pub fn run_sync_dormant(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let settings = sync_settings()?;
    let entries = store.dormant_entries(settings.max_retries)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No dormant changes.");
        return Ok(());
    }

    for line in format_queue_lines(&entries) {
        println!("{line}");
    }
    println!("Run `irodori sync retry <entry-id>` to try one again.");
    Ok(())
}

pub fn run_sync_retry(entry_id: i64, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    if !store.revive_entry(entry_id)? {
        return Err(CliError::QueueEntryNotFound(entry_id));
    }
    println!("Entry #{entry_id} will be retried on the next sync");
    Ok(())
}

/// Run the scheduler in the foreground, printing merged changes until Ctrl-C
pub async fn run_sync_watch(db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(open_store(db_path)?)?;
    let mut events = engine.store().subscribe();
    let handle = engine.start();
    println!(
        "Syncing every {}s; press Ctrl-C to stop",
        engine.settings().interval.as_secs()
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) if event.origin == ChangeOrigin::Remote => {
                    println!("Pulled {} {}", kind_label(event.kind), short_id(&event.id));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Change events lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    let status = engine.status()?;
    println!("Stopped; {} change(s) queued", status.pending_count);
    Ok(())
}
