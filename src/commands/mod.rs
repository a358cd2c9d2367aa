//! CLI commands module.

pub mod create;
pub mod run;
pub mod status;
pub mod unlock;

use std::path::{Path, PathBuf};

use anyhow::Result;
use chronicle_migrations::config::DEFAULT_MIGRATIONS_PATH;
use chronicle_migrations::{
    LedgerRepair, MigrationConfig, MigrationError, MigrationRegistry, MigrationRunner,
    ProjectConfig,
};
use tracing::debug;

use crate::cli::GlobalArgs;

/// Load the project file named by `--config`, or the first one in the working directory.
pub fn load_project(global: &GlobalArgs) -> Result<Option<ProjectConfig>> {
    if let Some(ref path) = global.config {
        debug!(path = %path.display(), "Loading project file");
        return Ok(Some(ProjectConfig::load(path)?));
    }

    let found = ProjectConfig::discover(Path::new("."))?;
    if let Some((ref path, _)) = found {
        debug!(path = %path.display(), "Found project file");
    }
    Ok(found.map(|(_, project)| project))
}

/// Build the run configuration: project file first, then command-line overrides.
pub fn migration_config(
    global: &GlobalArgs,
    project: Option<&ProjectConfig>,
) -> Result<MigrationConfig> {
    let mut builder = match project {
        Some(project) => {
            // A URL on the command line makes the named connection optional.
            if global.database_url.is_none() {
                project.connection(&global.connection)?;
            }
            project.builder_for(&global.connection)
        }
        None => MigrationConfig::builder(),
    };

    match global.database_url {
        Some(ref url) => builder = builder.database_url(url),
        None if project.is_none() => {
            return Err(MigrationError::config(
                "No database configured: pass --database-url, set DATABASE_URL \
                 or define [connections.default] in chronicle.toml",
            )
            .into())
        }
        None => {}
    }

    if let Some(ref path) = global.path {
        builder = builder.migrations_path(path);
    }
    if let Some(ref table) = global.table {
        builder = builder.table_name(table);
    }
    if global.repair_ledger {
        builder = builder.ledger_repair(LedgerRepair::Recreate);
    }
    if global.no_lock {
        builder = builder.use_lock(false);
    }

    Ok(builder.build()?)
}

/// Migrations directory without touching the database.
pub fn migrations_path(global: &GlobalArgs, project: Option<&ProjectConfig>) -> PathBuf {
    global
        .path
        .clone()
        .or_else(|| project.and_then(|p| p.migrations.path.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_PATH))
}

/// Resolve configuration and connect a runner.
pub async fn connect(global: &GlobalArgs) -> Result<MigrationRunner> {
    let project = load_project(global)?;
    let config = migration_config(global, project.as_ref())?;

    debug!(
        database_type = %config.database_type,
        table = %config.table_name,
        path = %config.migrations_path.display(),
        "Connecting"
    );

    Ok(MigrationRunner::connect(config, MigrationRegistry::new()).await?)
}
