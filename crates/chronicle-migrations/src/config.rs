//! Migration configuration.

use crate::error::{MigrationError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory scanned when no path is given.
pub const DEFAULT_MIGRATIONS_PATH: &str = "config/sql/migrations";

/// Ledger table used when no name is given.
pub const DEFAULT_TABLE_NAME: &str = "schema_migrations";

/// Connection used when no name is given.
pub const DEFAULT_CONNECTION: &str = "default";

/// Project files looked up in the working directory, in order.
pub const PROJECT_FILES: [&str; 4] = [
    "chronicle.toml",
    "chronicle.yaml",
    "chronicle.yml",
    "chronicle.json",
];

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Database type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL database.
    #[default]
    PostgreSQL,
    /// SQLite database.
    SQLite,
}

impl DatabaseType {
    /// Parse from a database URL.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if url.starts_with("sqlite://") || url.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PostgreSQL => write!(f, "postgresql"),
            Self::SQLite => write!(f, "sqlite"),
        }
    }
}

/// What to do when the ledger table exists with the wrong structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LedgerRepair {
    /// Stop with a schema mismatch error.
    #[default]
    Fail,
    /// Drop the table and create it again. Applied history is lost.
    Recreate,
}

/// Migration configuration, built once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Database type (auto-detected if not specified).
    pub database_type: DatabaseType,

    /// Ledger table name.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Directory holding migration files.
    #[serde(default = "default_migrations_path")]
    pub migrations_path: PathBuf,

    /// Migration file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Connection timeout.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Maximum connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Whether runs take the advisory lock.
    #[serde(default = "default_true")]
    pub use_lock: bool,

    /// Ledger structure mismatch policy.
    #[serde(default)]
    pub ledger_repair: LedgerRepair,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_migrations_path() -> PathBuf {
    PathBuf::from(DEFAULT_MIGRATIONS_PATH)
}

fn default_extension() -> String {
    "sql".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_type: DatabaseType::PostgreSQL,
            table_name: default_table_name(),
            migrations_path: default_migrations_path(),
            extension: default_extension(),
            connect_timeout: default_connect_timeout(),
            max_connections: default_max_connections(),
            use_lock: true,
            ledger_repair: LedgerRepair::Fail,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::new()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(MigrationError::config("Database URL is required"));
        }

        if DatabaseType::from_url(&self.database_url).is_none() {
            return Err(MigrationError::UnsupportedDatabase(
                self.database_url
                    .split(':')
                    .next()
                    .unwrap_or_default()
                    .to_string(),
            ));
        }

        if !IDENTIFIER.is_match(&self.table_name) {
            return Err(MigrationError::config(format!(
                "Table name {:?} must be a plain SQL identifier",
                self.table_name
            )));
        }

        if self.extension.is_empty() || !self.extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MigrationError::config(format!(
                "Migration extension {:?} must be alphanumeric",
                self.extension
            )));
        }

        if self.max_connections == 0 {
            return Err(MigrationError::config(
                "Max connections must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Name of the table backing the run lock.
    #[must_use]
    pub fn lock_table_name(&self) -> String {
        format!("{}_lock", self.table_name)
    }
}

/// Builder for migration configuration.
#[derive(Debug, Default)]
pub struct MigrationConfigBuilder {
    config: MigrationConfig,
}

impl MigrationConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if let Some(db_type) = DatabaseType::from_url(&url) {
            self.config.database_type = db_type;
        }
        self.config.database_url = url;
        self
    }

    /// Set the ledger table name.
    #[must_use]
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config.table_name = name.into();
        self
    }

    /// Set the migrations directory.
    #[must_use]
    pub fn migrations_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.migrations_path = path.into();
        self
    }

    /// Set the migration file extension.
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set maximum connections.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Enable or disable the run lock.
    #[must_use]
    pub fn use_lock(mut self, use_lock: bool) -> Self {
        self.config.use_lock = use_lock;
        self
    }

    /// Set the ledger mismatch policy.
    #[must_use]
    pub fn ledger_repair(mut self, repair: LedgerRepair) -> Self {
        self.config.ledger_repair = repair;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<MigrationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// A named connection from the project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database connection URL.
    pub url: String,

    /// Maximum connection pool size.
    #[serde(default)]
    pub max_connections: Option<u32>,

    /// Connection timeout.
    #[serde(default, with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
}

/// The `[migrations]` section of the project file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationsSection {
    /// Directory holding migration files.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Ledger table name.
    #[serde(default)]
    pub table: Option<String>,

    /// Migration file extension.
    #[serde(default)]
    pub extension: Option<String>,

    /// Template used by `create`.
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Project file: named connections plus migration defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Migration defaults.
    #[serde(default)]
    pub migrations: MigrationsSection,

    /// Named database connections.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

impl ProjectConfig {
    /// Load a project file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(MigrationError::config(format!(
                    "Unsupported config format: {}",
                    other.unwrap_or("none")
                )))
            }
        };

        Ok(config)
    }

    /// Find and load the first project file present in `dir`.
    pub fn discover(dir: &Path) -> Result<Option<(PathBuf, Self)>> {
        for name in PROJECT_FILES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok(Some((candidate, config)));
            }
        }
        Ok(None)
    }

    /// Look up a named connection.
    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig> {
        self.connections.get(name).ok_or_else(|| {
            let known: Vec<_> = self.connections.keys().map(String::as_str).collect();
            MigrationError::config(format!(
                "Connection {:?} is not defined (known: {})",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })
    }

    /// Seed a builder with the named connection and the file's defaults.
    ///
    /// A missing connection is not an error here: the caller may still supply
    /// a URL from the command line or the environment.
    #[must_use]
    pub fn builder_for(&self, connection: &str) -> MigrationConfigBuilder {
        let mut builder = MigrationConfig::builder();

        if let Some(conn) = self.connections.get(connection) {
            builder = builder.database_url(&conn.url);
            if let Some(max) = conn.max_connections {
                builder = builder.max_connections(max);
            }
            if let Some(timeout) = conn.connect_timeout {
                builder = builder.connect_timeout(timeout);
            }
        }
        if let Some(ref path) = self.migrations.path {
            builder = builder.migrations_path(path);
        }
        if let Some(ref table) = self.migrations.table {
            builder = builder.table_name(table);
        }
        if let Some(ref extension) = self.migrations.extension {
            builder = builder.extension(extension);
        }

        builder
    }
}
