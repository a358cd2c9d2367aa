//! Create command - scaffold a new migration file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chronicle_migrations::scaffold;
use clap::Args;
use serde::Serialize;

use crate::cli::GlobalArgs;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for create.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Migration name, e.g. "create users" or CreateUsers
    #[arg(required = true, num_args = 1..)]
    pub name: Vec<String>,

    /// Template file with {{ name }}, {{ nice_name }}, {{ version }} and {{ date }} placeholders
    #[arg(long)]
    pub template: Option<PathBuf>,
}

/// Create output.
#[derive(Debug, Serialize)]
pub struct CreateOutput {
    pub path: PathBuf,
}

/// Execute create.
pub fn execute(args: CreateArgs, global: &GlobalArgs) -> Result<()> {
    let format = OutputFormat::from_json_flag(global.json);
    let project = super::load_project(global)?;

    let dir = super::migrations_path(global, project.as_ref());
    let extension = project
        .as_ref()
        .and_then(|p| p.migrations.extension.clone())
        .unwrap_or_else(|| "sql".to_string());

    let template_path = args
        .template
        .or_else(|| project.as_ref().and_then(|p| p.migrations.template.clone()));
    let template = template_path
        .map(|path| {
            std::fs::read_to_string(&path)
                .with_context(|| format!("Cannot read template {}", path.display()))
        })
        .transpose()?;

    let name = args.name.join(" ");
    let path = scaffold(
        &dir,
        extension.trim_start_matches('.'),
        &name,
        template.as_deref(),
        chrono::Local::now(),
    )?;

    match format {
        OutputFormat::Json => {
            CommandResult::success(CreateOutput { path })
                .with_message("Migration created")
                .print(format)?;
        }
        OutputFormat::Text => {
            output::success("Migration created successfully!");
            output::key_value("File", &path.display().to_string());
            output::info("Fill in the -- up and -- down sections");
        }
    }

    Ok(())
}
