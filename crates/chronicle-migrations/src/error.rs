//! Migration error types.

use std::path::PathBuf;

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Migration error type.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database not supported.
    #[error("Database type not supported: {0}")]
    UnsupportedDatabase(String),

    /// Migrations directory is missing or unreadable.
    #[error(
        "Migrations directory {} does not exist or cannot be read. \
         Create it (default location: {default_path}) or point --path at an existing directory",
        path.display()
    )]
    Path {
        /// Directory that was requested.
        path: PathBuf,
        /// Directory used when none is given.
        default_path: String,
    },

    /// Ledger table exists with an unexpected structure.
    #[error(
        "Ledger table {table} has an unexpected structure: expected [{expected}], found [{found}]. \
         Fix the table by hand or rerun with --repair-ledger to drop and recreate it"
    )]
    SchemaMismatch {
        /// Ledger table name.
        table: String,
        /// Expected columns.
        expected: String,
        /// Columns found in the database.
        found: String,
    },

    /// Malformed date argument.
    #[error("Date must be in format YYYYMMDDHHMMSS: {0}")]
    Format(String),

    /// Migration script could not be resolved.
    #[error("Cannot resolve migration {name}: {reason}")]
    Resolution {
        /// Migration name.
        name: String,
        /// Why resolution failed.
        reason: String,
    },

    /// SQL statement error.
    #[error("SQL execution error: {0}")]
    Statement(String),

    /// A migration step failed and the run halted.
    #[error("Migration {name} ({stamp}) failed: {reason}")]
    Execution {
        /// Migration version.
        version: i64,
        /// Version rendered as YYYYMMDDHHMMSS.
        stamp: String,
        /// Migration name.
        name: String,
        /// Failure reason.
        reason: String,
    },

    /// Two migration files share a version.
    #[error("Migration version {stamp} is used by both {first} and {second}")]
    DuplicateFile {
        /// Version rendered as YYYYMMDDHHMMSS.
        stamp: String,
        /// First file name.
        first: String,
        /// Second file name.
        second: String,
    },

    /// Ledger already holds this version.
    #[error("Migration version {version} is already recorded in the ledger")]
    DuplicateVersion {
        /// Migration version.
        version: i64,
    },

    /// Ledger row not found.
    #[error("Ledger record {id} not found")]
    RecordNotFound {
        /// Surrogate id.
        id: i64,
    },

    /// Ledger read/write failure.
    #[error("Ledger error: {0}")]
    Store(String),

    /// Drop-all transaction failed and was rolled back.
    #[error("Can not drop table {table}, no table was dropped: {reason}")]
    DropFailed {
        /// Table whose drop failed.
        table: String,
        /// Failure reason.
        reason: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire migration lock: {0}")]
    LockFailed(String),

    /// Scaffolding error.
    #[error("Template error: {0}")]
    Template(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MigrationError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a ledger error.
    pub fn store(msg: impl std::fmt::Display) -> Self {
        Self::Store(msg.to_string())
    }

    /// Create a resolution error.
    pub fn resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error stops the process before any migration runs.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Config(_)
                | Self::UnsupportedDatabase(_)
                | Self::Path { .. }
                | Self::SchemaMismatch { .. }
        )
    }

    /// Check if the error halted a run part way through.
    #[must_use]
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Execution { .. })
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Self::Config(e.to_string()),
            sqlx::Error::Database(e) => Self::Statement(e.to_string()),
            sqlx::Error::Io(e) => Self::Io(e),
            sqlx::Error::PoolTimedOut => Self::Connection("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Connection("Connection pool is closed".to_string()),
            _ => Self::Statement(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for MigrationError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MigrationError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
