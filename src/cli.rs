//! CLI argument definitions using clap.

use std::path::PathBuf;

use anyhow::Result;
use chronicle_migrations::config::DEFAULT_CONNECTION;
use clap::{Args, Parser, Subcommand};

use crate::commands;

/// Chronicle - timestamp-ordered database migrations
#[derive(Parser, Debug)]
#[command(name = "chronicle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Named connection from the project file
    #[arg(short = 'c', long, default_value = DEFAULT_CONNECTION, global = true)]
    pub connection: String,

    /// Migrations directory
    #[arg(short = 'p', long, global = true)]
    pub path: Option<PathBuf>,

    /// Project file (chronicle.toml, .yaml or .json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overriding the named connection
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Ledger table name
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Drop and recreate a ledger table with the wrong structure
    #[arg(long, global = true)]
    pub repair_ledger: bool,

    /// Do not take the run lock
    #[arg(long, global = true)]
    pub no_lock: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations, optionally up to a date (YYYYMMDDHHMMSS)
    Up(commands::run::UpArgs),

    /// Revert migrations newer than a date, the last one, or all of them
    Down(commands::run::DownArgs),

    /// Revert every migration; with --force also drop every table
    Reset(commands::run::ResetArgs),

    /// Reset, then apply every migration
    Rebuild(commands::run::ResetArgs),

    /// Create a new migration file
    Create(commands::create::CreateArgs),

    /// Show applied and pending migrations
    Status,

    /// Clear a run lock left behind by an interrupted run
    Unlock,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let global = self.global;
        match self.command {
            Commands::Up(args) => commands::run::up(args, &global).await,
            Commands::Down(args) => commands::run::down(args, &global).await,
            Commands::Reset(args) => commands::run::reset(args, &global).await,
            Commands::Rebuild(args) => commands::run::rebuild(args, &global).await,
            Commands::Create(args) => commands::create::execute(args, &global),
            Commands::Status => commands::status::execute(&global).await,
            Commands::Unlock => commands::unlock::execute(&global).await,
        }
    }
}
