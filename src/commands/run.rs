//! Run commands - up, down, reset and rebuild.

use anyhow::{bail, Result};
use chronicle_migrations::version::display_version;
use chronicle_migrations::{Direction, DownTarget, RunReport, UpTarget};
use clap::Args;
use serde::Serialize;

use crate::cli::GlobalArgs;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for up.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Apply migrations up to and including this date (YYYYMMDDHHMMSS)
    pub date: Option<String>,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for down.
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Date (YYYYMMDDHHMMSS), "last" or "all"
    pub target: Option<String>,

    /// Revert every migration
    #[arg(long, conflicts_with = "target")]
    pub all: bool,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,
}

impl DownArgs {
    fn target(&self) -> Result<DownTarget> {
        if self.all {
            return Ok(DownTarget::All);
        }
        match self.target.as_deref() {
            Some(target) => Ok(target.parse::<DownTarget>()?),
            None => bail!("Date is needed or input \"last\" to revert the last up."),
        }
    }
}

/// Arguments for reset and rebuild.
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Also drop every table except the ledger
    #[arg(long)]
    pub force: bool,
}

/// A migration a dry run would touch.
#[derive(Debug, Serialize)]
pub struct PlannedStep {
    pub version: i64,
    pub stamp: String,
    pub name: String,
    pub direction: Direction,
}

/// Dry run output.
#[derive(Debug, Serialize)]
pub struct DryRunOutput {
    pub dry_run: bool,
    pub migrations: Vec<PlannedStep>,
}

/// Execute up.
pub async fn up(args: UpArgs, global: &GlobalArgs) -> Result<()> {
    let format = OutputFormat::from_json_flag(global.json);
    let target = UpTarget::parse(args.date.as_deref())?;
    let runner = super::connect(global).await?;

    if args.dry_run {
        let planned = runner
            .plan_up(target)
            .await?
            .into_iter()
            .map(|file| PlannedStep {
                version: file.version,
                stamp: file.stamp(),
                name: file.name,
                direction: Direction::Up,
            })
            .collect();
        return print_plan(planned, format);
    }

    let report = runner.up(target).await?;
    print_report(&report, format)
}

/// Execute down.
pub async fn down(args: DownArgs, global: &GlobalArgs) -> Result<()> {
    let format = OutputFormat::from_json_flag(global.json);
    let target = args.target()?;
    let runner = super::connect(global).await?;

    if args.dry_run {
        let planned = runner
            .plan_down(target)
            .await?
            .into_iter()
            .map(|record| PlannedStep {
                version: record.version,
                stamp: record.stamp(),
                name: record.name,
                direction: Direction::Down,
            })
            .collect();
        return print_plan(planned, format);
    }

    let report = runner.down(target).await?;
    print_report(&report, format)
}

/// Execute reset.
pub async fn reset(args: ResetArgs, global: &GlobalArgs) -> Result<()> {
    let format = OutputFormat::from_json_flag(global.json);
    let runner = super::connect(global).await?;
    let report = runner.reset(args.force).await?;
    print_report(&report, format)
}

/// Execute rebuild.
pub async fn rebuild(args: ResetArgs, global: &GlobalArgs) -> Result<()> {
    let format = OutputFormat::from_json_flag(global.json);
    let runner = super::connect(global).await?;
    let report = runner.rebuild(args.force).await?;
    print_report(&report, format)
}

fn print_plan(planned: Vec<PlannedStep>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let count = planned.len();
            CommandResult::success(DryRunOutput {
                dry_run: true,
                migrations: planned,
            })
            .with_message(format!("{count} migration(s) would run"))
            .print(format)?;
        }
        OutputFormat::Text => {
            output::info(&format!("Dry run - {} migration(s) would run:", planned.len()));
            for step in &planned {
                output::step(
                    step.direction == Direction::Up,
                    &step.stamp,
                    &step.name,
                    &display_version(step.version),
                );
            }
        }
    }
    Ok(())
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            CommandResult::success(report)
                .with_message(report.message())
                .print(format)?;
        }
        OutputFormat::Text => {
            for step in &report.steps {
                output::step(
                    step.direction == Direction::Up,
                    &step.stamp,
                    &step.name,
                    &format!("({}ms)", step.execution_time_ms),
                );
            }
            if !report.dropped_tables.is_empty() {
                output::info(&format!(
                    "Dropped {} table(s): {}",
                    report.dropped_tables.len(),
                    report.dropped_tables.join(", ")
                ));
            }
            output::success(report.message());
        }
    }
    Ok(())
}
