//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// taskfold - a folder of markdown files as your task database
#[derive(Parser, Debug)]
#[command(name = "tf", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Task folder, bypassing bookmark and detection
    #[arg(long, global = true, env = "TASKFOLD_ROOT")]
    pub root: Option<PathBuf>,

    /// Config directory (default: ~/.taskfold)
    #[arg(long, global = true, env = "TASKFOLD_HOME")]
    pub config_dir: Option<PathBuf>,

    /// Actor name recorded as `completed_by`
    #[arg(long, global = true, env = "TF_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and create the task folder
    Init {
        /// Use (and remember) this folder
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Show the task folder and the rule that chose it
    Root,

    /// Detect changes in the task folder
    Scan {
        /// Keep polling
        #[arg(long)]
        watch: bool,

        /// Seconds between passes with --watch
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Stop after this many passes with --watch
        #[arg(long)]
        passes: Option<usize>,
    },

    /// Task management
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Files with unreconciled versions from other devices
    Conflicts {
        #[command(subcommand)]
        command: ConflictCommands,
    },

    /// Writes waiting to be retried
    Journal {
        #[command(subcommand)]
        command: JournalCommands,
    },

    /// Files that fail to parse
    Diagnostics,

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Task Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Create(TaskCreateArgs),

    /// List tasks
    List(TaskListArgs),

    /// Show one task
    Show {
        /// Reference id (T-1a2b) or file path
        id: String,
    },

    /// Update a task
    Update(TaskUpdateArgs),

    /// Mark task(s) done; recurring tasks get their next occurrence
    Complete {
        /// Reference ids or file paths
        ids: Vec<String>,
    },

    /// Delete task(s)
    Delete {
        /// Reference ids or file paths
        ids: Vec<String>,
    },

    /// Set the manual order of tasks
    Order {
        /// Reference ids, first to last
        ids: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct TaskCreateArgs {
    /// Task title
    pub title: String,

    /// Free-form notes
    #[arg(short, long)]
    pub body: Option<String>,

    /// Status (todo, doing, waiting, done, cancelled)
    #[arg(short, long, default_value = "todo")]
    pub status: String,

    /// Priority (none, low, medium, high, or 0-3)
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,

    /// Hidden until (YYYY-MM-DD)
    #[arg(long)]
    pub defer: Option<String>,

    /// Planned for (YYYY-MM-DD)
    #[arg(long)]
    pub scheduled: Option<String>,

    /// Tags (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    #[arg(long)]
    pub area: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    /// Recurrence rule, e.g. FREQ=MONTHLY or "every 2 weeks"
    #[arg(short, long)]
    pub recurrence: Option<String>,

    /// Flag the task
    #[arg(long)]
    pub flag: bool,

    /// Blocked by these reference ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub blocked_by: Vec<String>,

    /// Attribution for where the task came from
    #[arg(long)]
    pub source: Option<String>,

    /// File name to use instead of one derived from the title
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(Args, Debug)]
pub struct TaskUpdateArgs {
    /// Reference id (T-1a2b) or file path
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub body: Option<String>,

    #[arg(short, long)]
    pub status: Option<String>,

    #[arg(short, long)]
    pub priority: Option<String>,

    /// Due date (YYYY-MM-DD, or "none" to clear)
    #[arg(long)]
    pub due: Option<String>,

    /// Hidden until (YYYY-MM-DD, or "none" to clear)
    #[arg(long)]
    pub defer: Option<String>,

    /// Planned for (YYYY-MM-DD, or "none" to clear)
    #[arg(long)]
    pub scheduled: Option<String>,

    /// Add tags (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub add_tags: Vec<String>,

    /// Remove tags (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub remove_tags: Vec<String>,

    #[arg(long)]
    pub area: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    /// Recurrence rule ("none" to clear)
    #[arg(short, long)]
    pub recurrence: Option<String>,

    #[arg(long, conflicts_with = "unflag")]
    pub flag: bool,

    #[arg(long)]
    pub unflag: bool,

    /// Blocked by these reference ids (comma-separated)
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["blocked", "unblock"])]
    pub blocked_by: Vec<String>,

    /// Blocked, without naming a blocker
    #[arg(long, conflicts_with = "unblock")]
    pub blocked: bool,

    /// Clear any blocking
    #[arg(long)]
    pub unblock: bool,
}

#[derive(Args, Debug)]
pub struct TaskListArgs {
    /// Only this status (synonyms accepted)
    #[arg(short, long)]
    pub status: Option<String>,

    /// Include done and cancelled tasks
    #[arg(short, long)]
    pub all: bool,

    /// Only tasks with this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Maximum tasks to show
    #[arg(short, long, default_value = "100")]
    pub limit: usize,
}

// ============================================================================
// Conflict Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConflictCommands {
    /// List files with unreconciled versions
    List,

    /// Show the local content and every version of one file
    Show {
        /// Task file path
        path: PathBuf,
    },

    /// Pick the content to keep and discard the other versions
    Resolve {
        /// Task file path
        path: PathBuf,

        /// Keep the local file
        #[arg(long, conflicts_with = "version")]
        keep_local: bool,

        /// Keep the version at this index (see `tf conflicts show`)
        #[arg(long)]
        version: Option<usize>,
    },
}

// ============================================================================
// Journal Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum JournalCommands {
    /// List queued writes
    List,

    /// Retry every queued write
    Replay,

    /// Discard one queued write
    Drop {
        /// Entry id
        id: String,
    },
}
