//! Command-line interface for cadence
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;
use crate::store::TaskStore;

mod actor;
mod args;
mod init;
mod series;
mod task;

pub use args::{PatchArgs, RuleArgs, TemplateArgs};

/// cadence - recurring task series
///
/// Define tasks that repeat on a schedule, materialize their occurrences
/// over a rolling horizon, and edit one occurrence, the rest of a series,
/// or the whole series.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding .cadence/ and .cadence.toml (defaults to current directory)
    #[arg(long, global = true, env = "CADENCE_ROOT")]
    pub root: Option<PathBuf>,

    /// Actor identity recorded on changes
    #[arg(long, global = true, env = "CADENCE_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize cadence in a directory
    Init,

    /// Recurring series
    #[command(subcommand)]
    Series(SeriesCommands),

    /// Tasks and occurrences
    #[command(subcommand)]
    Task(TaskCommands),

    /// Set or show actor identity
    #[command(subcommand)]
    Actor(ActorCommands),
}

/// Series subcommands
#[derive(Subcommand, Debug)]
pub enum SeriesCommands {
    /// Create a series and generate its first occurrences
    New {
        #[command(flatten)]
        template: TemplateArgs,

        /// First date the series may occur on (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        #[command(flatten)]
        rule: RuleArgs,

        /// Generate through this date instead of the rolling horizon
        #[arg(long)]
        horizon: Option<String>,
    },

    /// Show the dates a rule would produce, without saving anything
    Preview {
        /// First date the series may occur on (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        #[command(flatten)]
        rule: RuleArgs,

        /// Last date to show (defaults to the rolling horizon)
        #[arg(long)]
        horizon: Option<String>,

        /// Show at most this many dates
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Generate missing occurrences up to the horizon
    Generate {
        /// Only this series (defaults to every active series)
        #[arg(long)]
        series: Option<String>,

        /// Generate through this date instead of the rolling horizon
        #[arg(long)]
        horizon: Option<String>,
    },

    /// List series
    List {
        /// Include stopped series
        #[arg(long)]
        all: bool,
    },

    /// Show a series and its occurrences
    Show {
        /// Series ID
        id: String,
    },

    /// Stop generating occurrences for a series
    Stop {
        /// Series ID
        id: String,

        /// Fail unless the series is still at this revision
        #[arg(long)]
        revision: Option<u64>,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a standalone task
    New {
        #[command(flatten)]
        template: TemplateArgs,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Initial status (defaults to tasks.default_status)
        #[arg(long)]
        status: Option<String>,
    },

    /// List tasks
    List {
        /// Only these statuses (repeatable)
        #[arg(long = "status")]
        statuses: Vec<String>,

        /// Only these priorities (repeatable)
        #[arg(long = "priority")]
        priorities: Vec<String>,

        /// Due on or after this date
        #[arg(long)]
        due_from: Option<String>,

        /// Due on or before this date
        #[arg(long)]
        due_to: Option<String>,

        /// Case-insensitive text in title, description or tags
        #[arg(long)]
        search: Option<String>,

        /// Only occurrences of this series
        #[arg(long)]
        series: Option<String>,

        /// Only tasks assigned to this person
        #[arg(long)]
        assignee: Option<String>,

        /// Sort field: due_date, priority, title, created_at, updated_at
        #[arg(long, default_value = "due_date")]
        sort: String,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Skip this many matches
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Page size (defaults to tasks.page_size)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a task
    Show {
        /// Task ID
        id: String,
    },

    /// Edit a task or, for an occurrence, its series
    Edit {
        /// Task ID
        id: String,

        /// Edit scope for occurrences: this, future, all
        #[arg(long, default_value = "this")]
        mode: String,

        /// Fail unless the series is still at this revision
        #[arg(long)]
        revision: Option<u64>,

        #[command(flatten)]
        patch: PatchArgs,

        // A rule here reschedules from this occurrence on (--mode future only).
        #[command(flatten)]
        rule: RuleArgs,
    },

    /// Move a task to a status column
    Move {
        /// Task ID
        id: String,

        /// Target status
        status: String,

        /// Index within the target column (defaults to the end)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

/// Actor subcommands
#[derive(Subcommand, Debug)]
pub enum ActorCommands {
    /// Persist the actor identity for this directory
    Set {
        /// Actor name
        name: String,
    },

    /// Show the resolved actor identity
    Show,
}

/// State shared by commands that work on the store
pub(crate) struct Context {
    pub store: TaskStore,
    pub actor: String,
    pub output: OutputOptions,
}

impl Context {
    fn open(root: Option<PathBuf>, actor: Option<String>, output: OutputOptions) -> Result<Self> {
        let root = resolve_root(root)?;
        let store = TaskStore::open(root)?;
        let actor = crate::actor::resolve_actor(Some(store.storage()), actor.as_deref())?;
        Ok(Self {
            store,
            actor,
            output,
        })
    }

    pub fn actor(&self) -> Option<&str> {
        Some(self.actor.as_str())
    }
}

pub(crate) fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        match self.command {
            Commands::Init => init::run(self.root, output),
            Commands::Actor(cmd) => match cmd {
                ActorCommands::Set { name } => actor::run_set(self.root, &name, output),
                ActorCommands::Show => actor::run_show(self.root, self.actor, output),
            },
            Commands::Series(cmd) => {
                let ctx = Context::open(self.root, self.actor, output)?;
                match cmd {
                    SeriesCommands::New {
                        template,
                        start,
                        rule,
                        horizon,
                    } => series::run_new(&ctx, template, &start, rule, horizon.as_deref()),
                    SeriesCommands::Preview {
                        start,
                        rule,
                        horizon,
                        limit,
                    } => series::run_preview(&ctx, &start, rule, horizon.as_deref(), limit),
                    SeriesCommands::Generate { series, horizon } => {
                        series::run_generate(&ctx, series.as_deref(), horizon.as_deref())
                    }
                    SeriesCommands::List { all } => series::run_list(&ctx, all),
                    SeriesCommands::Show { id } => series::run_show(&ctx, &id),
                    SeriesCommands::Stop { id, revision } => series::run_stop(&ctx, &id, revision),
                }
            }
            Commands::Task(cmd) => {
                let ctx = Context::open(self.root, self.actor, output)?;
                match cmd {
                    TaskCommands::New {
                        template,
                        due,
                        status,
                    } => task::run_new(&ctx, template, due.as_deref(), status.as_deref()),
                    TaskCommands::List {
                        statuses,
                        priorities,
                        due_from,
                        due_to,
                        search,
                        series,
                        assignee,
                        sort,
                        desc,
                        offset,
                        limit,
                    } => task::run_list(
                        &ctx,
                        task::ListOptions {
                            statuses,
                            priorities,
                            due_from,
                            due_to,
                            search,
                            series,
                            assignee,
                            sort,
                            desc,
                            offset,
                            limit,
                        },
                    ),
                    TaskCommands::Show { id } => task::run_show(&ctx, &id),
                    TaskCommands::Edit {
                        id,
                        mode,
                        revision,
                        patch,
                        rule,
                    } => task::run_edit(&ctx, &id, &mode, revision, patch, rule),
                    TaskCommands::Move { id, status, index } => {
                        task::run_move(&ctx, &id, &status, index)
                    }
                    TaskCommands::Delete { id } => task::run_delete(&ctx, &id),
                }
            }
        }
    }
}
