//! Migration file discovery.

use crate::config::DEFAULT_MIGRATIONS_PATH;
use crate::error::{MigrationError, Result};
use crate::migration::{MigrationFile, MigrationRecord};
use crate::version::{format_stamp, parse_stamp};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory of timestamped migration files.
#[derive(Debug, Clone)]
pub struct MigrationRepository {
    path: PathBuf,
    extension: String,
    pattern: Regex,
}

impl MigrationRepository {
    /// Create a repository over `path` for files ending in `.extension`.
    pub fn new(path: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^(\d{{14}})_([A-Za-z0-9_]+)\.{}$",
            regex::escape(extension)
        ))
        .map_err(|e| MigrationError::config(e.to_string()))?;

        Ok(Self {
            path: path.into(),
            extension: extension.to_string(),
            pattern,
        })
    }

    /// Directory being scanned.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File extension, without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Fail unless the directory exists and can be read.
    pub fn check(&self) -> Result<()> {
        let readable = self.path.is_dir() && std::fs::read_dir(&self.path).is_ok();
        if readable {
            Ok(())
        } else {
            Err(MigrationError::Path {
                path: self.path.clone(),
                default_path: DEFAULT_MIGRATIONS_PATH.to_string(),
            })
        }
    }

    /// Parse a file name into its stamp and name parts.
    #[must_use]
    pub fn parse_file_name<'a>(&self, file_name: &'a str) -> Option<(&'a str, &'a str)> {
        let caps = self.pattern.captures(file_name)?;
        let stamp = caps.get(1)?.as_str();
        let name = caps.get(2)?.as_str();
        Some((stamp, name))
    }

    /// List every migration file in the directory, in no particular order.
    pub fn discover(&self) -> Result<Vec<MigrationFile>> {
        let entries = std::fs::read_dir(&self.path).map_err(|_| MigrationError::Path {
            path: self.path.clone(),
            default_path: DEFAULT_MIGRATIONS_PATH.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some((stamp, name)) = self.parse_file_name(file_name) else {
                continue;
            };

            match parse_stamp(stamp) {
                Ok(version) => files.push(MigrationFile::new(entry.path(), version, name)),
                Err(e) => warn!(file = file_name, error = %e, "Skipping migration with invalid date"),
            }
        }

        debug!(path = %self.path.display(), count = files.len(), "Discovered migrations");
        Ok(files)
    }

    /// The file a ledger row was applied from.
    #[must_use]
    pub fn expected_file(&self, record: &MigrationRecord) -> MigrationFile {
        let file_name = format!(
            "{}_{}.{}",
            format_stamp(record.version),
            record.name,
            self.extension
        );
        MigrationFile::new(self.path.join(file_name), record.version, &record.name)
    }
}
