//! Status command - applied and pending migrations.

use anyhow::Result;
use chronicle_migrations::version::display_version;
use chronicle_migrations::{MigrationState, StatusEntry, StatusReport};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::GlobalArgs;
use crate::output::{self, CommandResult, OutputFormat};

/// Table row for one migration.
#[derive(Debug, Tabled)]
struct StatusRow {
    #[tabled(rename = "Version")]
    stamp: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: MigrationState,
    #[tabled(rename = "Applied At")]
    applied_at: String,
}

impl From<&StatusEntry> for StatusRow {
    fn from(entry: &StatusEntry) -> Self {
        Self {
            stamp: entry.stamp.clone(),
            name: entry.name.clone(),
            state: entry.state,
            applied_at: entry
                .applied_at
                .map_or_else(|| "-".to_string(), output::format_timestamp),
        }
    }
}

/// Status output.
#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    #[serde(flatten)]
    report: &'a StatusReport,
    locked_by: Option<String>,
}

/// Execute status.
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let format = OutputFormat::from_json_flag(global.json);
    let runner = super::connect(global).await?;

    let report = runner.status().await?;
    let holder = runner.lock_holder().await?;

    match format {
        OutputFormat::Json => {
            CommandResult::success(StatusOutput {
                report: &report,
                locked_by: holder.map(|h| h.holder),
            })
            .print(format)?;
        }
        OutputFormat::Text => {
            output::section("Migration Status");
            output::key_value(
                "Last version",
                &if report.last_version == 0 {
                    "none".to_string()
                } else {
                    display_version(report.last_version)
                },
            );
            for state in [
                MigrationState::Applied,
                MigrationState::Pending,
                MigrationState::Skipped,
                MigrationState::Missing,
            ] {
                let count = report.with_state(state).count();
                if count > 0 || matches!(state, MigrationState::Applied | MigrationState::Pending) {
                    output::key_value(&capitalize(&state.to_string()), &count.to_string());
                }
            }
            println!();

            let rows: Vec<StatusRow> = report.entries.iter().map(StatusRow::from).collect();
            output::table(&rows);

            if report.with_state(MigrationState::Skipped).next().is_some() {
                output::warning("Skipped migrations are older than the last applied version and will not run");
            }
            if let Some(holder) = holder {
                output::warning(&format!(
                    "Run lock held by {} since {}",
                    holder.holder,
                    display_version(holder.acquired)
                ));
            }
        }
    }

    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}
