//! Irodori CLI - tasks, notes and prompts from the terminal
//!
//! Every command works offline against the local store; `irodori sync`
//! reconciles with the remote store when it is reachable.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use cli::{Cli, Commands};
use commands::common::resolve_db_path;
use commands::completions::run_completions;
use commands::config::run_config;
use commands::note::run_note;
use commands::prompt::run_prompt;
use commands::sync::run_sync;
use commands::task::{run_subnote, run_task};
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    // Command output goes to stdout; logs stay quiet unless RUST_LOG asks
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("irodori=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Task { command } => run_task(command, &db_path)?,
        Commands::Subnote { command } => run_subnote(command, &db_path)?,
        Commands::Note { command } => run_note(command, &db_path)?,
        Commands::Prompt { command } => run_prompt(command, &db_path)?,
        Commands::Sync { command } => run_sync(command, &db_path).await?,
        Commands::Config { command } => run_config(command, &db_path)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
