//! # Chronicle
//!
//! Applies and reverts timestamped SQL migrations and records them in a
//! ledger table inside the target database.
//!
//! ## Usage
//!
//! ```bash
//! # Apply everything that is pending
//! chronicle up
//!
//! # Apply up to a point in time
//! chronicle up 20230115120000
//!
//! # Revert the last migration
//! chronicle down last
//!
//! # Scaffold a new migration
//! chronicle create "create users"
//! ```

use std::process::ExitCode;

use chronicle_migrations::MigrationError;
use clap::Parser;

mod cli;
mod commands;
mod output;

use cli::Cli;
use output::{CommandResult, OutputFormat};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.global.verbose, cli.global.json);

    let format = OutputFormat::from_json_flag(cli.global.json);

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let result: CommandResult<()> = CommandResult::failure(format!("{err:#}"));
            let _ = result.print(format);
            exit_code(&err)
        }
    }
}

/// 2 for errors that stop the process before any migration runs, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<MigrationError>() {
        Some(e) if e.is_fatal() => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

/// Initialize tracing/logging based on verbosity and format.
fn init_tracing(verbose: u8, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays parseable.
    if json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(verbose > 1)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
