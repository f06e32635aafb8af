use std::env;
use std::path::Path;

use irodori_core::config::{REMOTE_TOKEN_ENV, REMOTE_URL_ENV};
use irodori_core::{ConfigError, RemoteConfig};
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::{open_store, remote_config, sync_settings};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::SetRemote { url, clear } => {
            if clear {
                run_config_clear_remote(db_path)
            } else {
                run_config_set_remote(url.as_deref().unwrap_or_default(), db_path)
            }
        }
        ConfigCommands::Show { json } => run_config_show(json, db_path),
    }
}

pub fn run_config_set_remote(url: &str, db_path: &Path) -> Result<(), CliError> {
    let url = url.trim();
    match RemoteConfig::from_url(url, env::var(REMOTE_TOKEN_ENV).ok()) {
        Ok(_) => {}
        // The token is read at sync time, so a missing one is only a warning here
        Err(ConfigError::Missing(name)) => {
            eprintln!("Warning: set {name} before syncing with {url}");
        }
        Err(error) => return Err(error.into()),
    }

    let store = open_store(db_path)?;
    store.set_remote_url(Some(url))?;
    println!("Remote set to {url}");
    Ok(())
}

pub fn run_config_clear_remote(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    store.set_remote_url(None)?;
    println!("Stored remote cleared");
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    db_path: String,
    remote: Option<String>,
    remote_source: Option<&'static str>,
    transport: Option<&'static str>,
    sync_interval_secs: u64,
    call_timeout_secs: u64,
    max_retries: u32,
    tombstone_policy: &'static str,
}

pub fn run_config_show(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let settings = sync_settings()?;
    let stored_url = store.remote_url()?;
    let remote = remote_config(&store)?;

    let remote_source = remote.as_ref().map(|_| {
        if stored_url.is_some() {
            "local settings"
        } else {
            REMOTE_URL_ENV
        }
    });
    let output = ConfigOutput {
        db_path: db_path.display().to_string(),
        remote: remote.as_ref().map(|config| config.url().to_string()),
        remote_source,
        transport: remote.as_ref().map(RemoteConfig::transport_name),
        sync_interval_secs: settings.interval.as_secs(),
        call_timeout_secs: settings.call_timeout.as_secs(),
        max_retries: settings.max_retries,
        tombstone_policy: settings.tombstone_policy.as_str(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database:         {}", output.db_path);
    match (&output.remote, output.remote_source, output.transport) {
        (Some(remote), Some(source), Some(transport)) => {
            println!("Remote:           {remote} ({transport}, from {source})");
        }
        _ => println!("Remote:           not configured"),
    }
    println!("Sync interval:    {}s", output.sync_interval_secs);
    println!("Call timeout:     {}s", output.call_timeout_secs);
    println!("Retry ceiling:    {}", output.max_retries);
    println!("Tombstone policy: {}", output.tombstone_policy);
    Ok(())
}
