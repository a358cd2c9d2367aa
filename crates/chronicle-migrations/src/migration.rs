//! Migration types: discovered files, ledger rows and executable scripts.

use crate::error::{MigrationError, Result};
use crate::pool::DatabasePool;
use crate::version::{display_version, format_stamp};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

static SECTION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^--\s*(up|down)(\s+migration)?\s*$").expect("valid section marker regex")
});

/// Direction a migration runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply.
    Up,
    /// Revert.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// A migration file found on disk.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// Version parsed from the stamp prefix.
    pub version: i64,
    /// Name part of the file name.
    pub name: String,
}

impl MigrationFile {
    /// Create a migration file description.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, version: i64, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version,
            name: name.into(),
        }
    }

    /// Version rendered as `YYYYMMDDHHMMSS`.
    #[must_use]
    pub fn stamp(&self) -> String {
        format_stamp(self.version)
    }

    /// File name without the directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl PartialEq for MigrationFile {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for MigrationFile {}

/// Ledger row for an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Surrogate key.
    pub id: i64,
    /// Migration version.
    pub version: i64,
    /// Migration name.
    pub name: String,
    /// Epoch seconds when the row was written.
    pub created: i64,
}

impl MigrationRecord {
    /// Version rendered as `YYYYMMDDHHMMSS`.
    #[must_use]
    pub fn stamp(&self) -> String {
        format_stamp(self.version)
    }

    /// When the row was written, in local time.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.created, 0).single()
    }
}

impl fmt::Display for MigrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, display_version(self.version))
    }
}

/// Executable unit for one migration.
#[async_trait]
pub trait MigrationScript: Send + Sync {
    /// Apply the migration.
    async fn apply(&self, db: &DatabasePool) -> Result<()>;

    /// Revert the migration.
    async fn revert(&self, db: &DatabasePool) -> Result<()>;
}

/// Plain SQL migration with up and down sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlScript {
    /// SQL run by `apply`.
    pub up_sql: String,
    /// SQL run by `revert`.
    pub down_sql: String,
}

impl SqlScript {
    /// Create a script from its two sections.
    #[must_use]
    pub fn new(up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        Self {
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Split file content into sections.
    ///
    /// Lines `-- up` and `-- down` (optionally followed by `migration`) switch
    /// sections. Content before any marker belongs to `up`. Other comment
    /// lines are dropped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut up = Vec::new();
        let mut down = Vec::new();
        let mut direction = Direction::Up;

        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(caps) = SECTION_MARKER.captures(trimmed) {
                direction = if caps[1].eq_ignore_ascii_case("down") {
                    Direction::Down
                } else {
                    Direction::Up
                };
                continue;
            }
            if trimmed.starts_with("--") {
                continue;
            }
            match direction {
                Direction::Up => up.push(line),
                Direction::Down => down.push(line),
            }
        }

        Self {
            up_sql: up.join("\n").trim().to_string(),
            down_sql: down.join("\n").trim().to_string(),
        }
    }

    /// Read and parse a migration file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&content))
    }

    /// Whether the script can be reverted.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        !self.down_sql.is_empty()
    }
}

#[async_trait]
impl MigrationScript for SqlScript {
    async fn apply(&self, db: &DatabasePool) -> Result<()> {
        db.execute_script(&self.up_sql).await
    }

    async fn revert(&self, db: &DatabasePool) -> Result<()> {
        if !self.is_reversible() {
            return Err(MigrationError::Statement(
                "migration has no down section".to_string(),
            ));
        }
        db.execute_script(&self.down_sql).await
    }
}
