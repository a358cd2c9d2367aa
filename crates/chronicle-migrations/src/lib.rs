//! # Chronicle Migrations
//!
//! Timestamp-ordered schema migrations with a ledger table.
//!
//! This crate provides:
//! - Discovery of `YYYYMMDDHHMMSS_name.sql` files
//! - A ledger of applied versions stored in the target database
//! - `up`, `down`, `reset` and `rebuild` runs that halt on the first failure
//! - Support for PostgreSQL and SQLite
//! - An advisory run lock and migration scaffolding
//!
//! ## Example
//!
//! ```rust,no_run
//! use chronicle_migrations::{MigrationConfig, MigrationRegistry, MigrationRunner, UpTarget};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrationConfig::builder()
//!         .database_url("postgres://localhost/app")
//!         .migrations_path("db/migrations")
//!         .build()?;
//!
//!     let runner = MigrationRunner::connect(config, MigrationRegistry::new()).await?;
//!     let report = runner.up(UpTarget::Latest).await?;
//!     println!("{}", report.message());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod error;
pub mod lock;
pub mod migration;
pub mod migrator;
pub mod pool;
pub mod registry;
pub mod repository;
pub mod scaffold;
pub mod store;
pub mod version;

pub use admin::SchemaAdmin;
pub use config::{
    ConnectionConfig, DatabaseType, LedgerRepair, MigrationConfig, MigrationConfigBuilder,
    ProjectConfig,
};
pub use error::{MigrationError, Result};
pub use lock::{LockHolder, RunLock};
pub use migration::{Direction, MigrationFile, MigrationRecord, MigrationScript, SqlScript};
pub use migrator::{
    MigrationRunner, MigrationState, Operation, RunOutcome, RunReport, StatusEntry, StatusReport,
    StepReport,
};
pub use pool::DatabasePool;
pub use registry::MigrationRegistry;
pub use repository::MigrationRepository;
pub use scaffold::scaffold;
pub use store::{LedgerState, VersionStore};
pub use version::{DownTarget, UpTarget};

/// Re-export sqlx types for convenience
pub use sqlx;
