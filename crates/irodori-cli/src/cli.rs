use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use irodori_core::TaskCategory;

#[derive(Parser)]
#[command(name = "irodori")]
#[command(about = "Tasks, notes and prompts that keep working offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage notes attached to a task
    Subnote {
        #[command(subcommand)]
        command: SubnoteCommands,
    },
    /// Manage free-standing notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage saved prompts
    Prompt {
        #[command(subcommand)]
        command: PromptCommands,
    },
    /// Reconcile with the remote store (runs one cycle when no subcommand is given)
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show or change the sync configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CategoryArg {
    ShortTerm,
    LongTerm,
    Project,
    Immediate,
}

impl From<CategoryArg> for TaskCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::ShortTerm => Self::ShortTerm,
            CategoryArg::LongTerm => Self::LongTerm,
            CategoryArg::Project => Self::Project,
            CategoryArg::Immediate => Self::Immediate,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

impl From<CompletionShell> for clap_complete::Shell {
    fn from(value: CompletionShell) -> Self {
        match value {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
        }
    }
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_enum, default_value_t = CategoryArg::ShortTerm)]
        category: CategoryArg,
    },
    /// List live tasks
    List {
        /// Only show tasks in this category
        #[arg(short, long, value_enum)]
        category: Option<CategoryArg>,
        /// Hide completed tasks
        #[arg(long)]
        open: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a task
    Update {
        /// Task ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description
        #[arg(long)]
        clear_description: bool,
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },
    /// Mark a task as done
    Done {
        /// Task ID or unique ID prefix
        id: String,
        /// Mark it as not done instead
        #[arg(long)]
        undo: bool,
    },
    /// Delete a task and its notes
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SubnoteCommands {
    /// Attach a note to a task
    Add {
        /// Task ID or unique ID prefix
        task_id: String,
        /// Note content
        content: Vec<String>,
    },
    /// Change a task note
    Update {
        /// Note ID or unique ID prefix
        id: String,
        /// New content
        content: Vec<String>,
    },
    /// Delete a task note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Create a note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Note content (stdin or $EDITOR when omitted)
        content: Vec<String>,
    },
    /// List notes, most recently updated first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a note
    Update {
        /// Note ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PromptCommands {
    /// Save a prompt at the end of the list
    #[command(alias = "new")]
    Add {
        /// Prompt title
        title: String,
        /// Prompt text (stdin or $EDITOR when omitted)
        content: Vec<String>,
    },
    /// List prompts in order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a prompt
    Update {
        /// Prompt ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a prompt
    Delete {
        /// Prompt ID or unique ID prefix
        id: String,
    },
    /// Move prompts to the front, in the given order
    Reorder {
        /// Prompt IDs or unique ID prefixes
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run one reconciliation cycle now
    Now {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show reachability and queue state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List queued changes that stopped retrying
    Dormant {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Retry a dormant queued change on the next cycle
    Retry {
        /// Queue entry ID as shown by `irodori sync dormant`
        entry_id: i64,
    },
    /// Keep syncing in the foreground until interrupted
    Watch,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Store the remote endpoint (http(s):// for the REST API, libsql:// for a database)
    SetRemote {
        #[arg(required_unless_present = "clear")]
        url: Option<String>,
        /// Forget the stored endpoint
        #[arg(long, conflicts_with = "url")]
        clear: bool,
    },
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
