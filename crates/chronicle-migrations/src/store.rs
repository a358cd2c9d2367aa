//! Ledger of applied migrations.

use crate::config::{DatabaseType, LedgerRepair};
use crate::error::{MigrationError, Result};
use crate::migration::MigrationRecord;
use crate::pool::{quote_identifier, ColumnInfo, ColumnKind, DatabasePool};
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ledger columns, in order.
pub const LEDGER_COLUMNS: [(&str, ColumnKind); 4] = [
    ("id", ColumnKind::Integer),
    ("version", ColumnKind::Integer),
    ("name", ColumnKind::String),
    ("created", ColumnKind::Integer),
];

/// Outcome of [`VersionStore::ensure_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerState {
    /// The table did not exist and was created.
    Created,
    /// The table existed with the expected structure.
    Valid,
    /// The table had the wrong structure and was dropped and recreated.
    Recreated,
}

/// Persistent record of applied migrations.
#[derive(Debug, Clone)]
pub struct VersionStore {
    pool: Arc<DatabasePool>,
    table: String,
    repair: LedgerRepair,
}

impl VersionStore {
    /// Create a store over `table`.
    pub fn new(pool: Arc<DatabasePool>, table: impl Into<String>, repair: LedgerRepair) -> Self {
        Self {
            pool,
            table: table.into(),
            repair,
        }
    }

    /// Ledger table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger if absent and check its structure otherwise.
    pub async fn ensure_table(&self) -> Result<LedgerState> {
        if !self.pool.table_exists(&self.table).await? {
            self.create_table().await?;
            info!(table = %self.table, "Created ledger table");
            return Ok(LedgerState::Created);
        }

        let columns = self.pool.describe_table(&self.table).await?;
        if matches_ledger(&columns) {
            debug!(table = %self.table, "Ledger table is valid");
            return Ok(LedgerState::Valid);
        }

        let found = columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.kind()))
            .collect::<Vec<_>>()
            .join(", ");

        match self.repair {
            LedgerRepair::Fail => Err(MigrationError::SchemaMismatch {
                table: self.table.clone(),
                expected: expected_columns(),
                found,
            }),
            LedgerRepair::Recreate => {
                warn!(
                    table = %self.table,
                    found = %found,
                    "Ledger table has an unexpected structure, dropping it and losing its history"
                );
                self.pool
                    .execute(&format!("DROP TABLE {}", quote_identifier(&self.table)))
                    .await
                    .map_err(|e| MigrationError::config(format!("Cannot drop ledger table: {e}")))?;
                self.create_table().await?;
                Ok(LedgerState::Recreated)
            }
        }
    }

    async fn create_table(&self) -> Result<()> {
        let table = quote_identifier(&self.table);
        let sql = match self.pool.database_type() {
            DatabaseType::PostgreSQL => format!(
                "CREATE TABLE {table} (
                    id BIGSERIAL PRIMARY KEY,
                    version BIGINT NOT NULL UNIQUE,
                    name VARCHAR(128) NOT NULL,
                    created BIGINT NOT NULL
                )"
            ),
            DatabaseType::SQLite => format!(
                "CREATE TABLE {table} (
                    id INTEGER PRIMARY KEY,
                    version INTEGER NOT NULL UNIQUE,
                    name VARCHAR(128) NOT NULL,
                    created INTEGER NOT NULL
                )"
            ),
        };

        self.pool
            .execute(&sql)
            .await
            .map_err(|e| MigrationError::config(format!("Cannot create ledger table: {e}")))?;
        Ok(())
    }

    /// All records, ascending by version.
    pub async fn list_all(&self) -> Result<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT id, version, name, created FROM {} ORDER BY version",
            quote_identifier(&self.table)
        );

        let rows = sqlx::query(&sql)
            .fetch_all(self.pool.inner())
            .await
            .map_err(MigrationError::store)?;

        rows.iter()
            .map(|row| -> Result<MigrationRecord> {
                Ok(MigrationRecord {
                    id: row.try_get("id").map_err(MigrationError::store)?,
                    version: row.try_get("version").map_err(MigrationError::store)?,
                    name: row.try_get("name").map_err(MigrationError::store)?,
                    created: row.try_get("created").map_err(MigrationError::store)?,
                })
            })
            .collect()
    }

    /// Highest applied version, or 0.
    pub async fn last_version(&self) -> Result<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX(version), 0) AS last FROM {}",
            quote_identifier(&self.table)
        );

        let row = sqlx::query(&sql)
            .fetch_one(self.pool.inner())
            .await
            .map_err(MigrationError::store)?;
        row.try_get("last").map_err(MigrationError::store)
    }

    /// Whether a version is recorded.
    pub async fn contains(&self, version: i64) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) AS n FROM {} WHERE version = $1",
            quote_identifier(&self.table)
        );

        let row = sqlx::query(&sql)
            .bind(version)
            .fetch_one(self.pool.inner())
            .await
            .map_err(MigrationError::store)?;
        let count: i64 = row.try_get("n").map_err(MigrationError::store)?;
        Ok(count > 0)
    }

    /// Record an applied migration.
    pub async fn append(&self, version: i64, name: &str, created: i64) -> Result<MigrationRecord> {
        if self.contains(version).await? {
            return Err(MigrationError::DuplicateVersion { version });
        }

        let sql = format!(
            "INSERT INTO {} (version, name, created) VALUES ($1, $2, $3) RETURNING id",
            quote_identifier(&self.table)
        );

        let row = sqlx::query(&sql)
            .bind(version)
            .bind(name)
            .bind(created)
            .fetch_one(self.pool.inner())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    MigrationError::DuplicateVersion { version }
                }
                other => MigrationError::store(other),
            })?;

        let id: i64 = row.try_get("id").map_err(MigrationError::store)?;
        debug!(id, version, name = %name, "Recorded migration");

        Ok(MigrationRecord {
            id,
            version,
            name: name.to_string(),
            created,
        })
    }

    /// Delete a record by id.
    pub async fn remove(&self, id: i64) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", quote_identifier(&self.table));

        let result = sqlx::query(&sql)
            .bind(id)
            .execute(self.pool.inner())
            .await
            .map_err(MigrationError::store)?;

        if result.rows_affected() == 0 {
            return Err(MigrationError::RecordNotFound { id });
        }

        debug!(id, "Removed migration record");
        Ok(())
    }
}

fn matches_ledger(columns: &[ColumnInfo]) -> bool {
    columns.len() == LEDGER_COLUMNS.len()
        && columns
            .iter()
            .zip(LEDGER_COLUMNS)
            .all(|(column, (name, kind))| column.name == name && column.kind() == kind)
}

fn expected_columns() -> String {
    LEDGER_COLUMNS
        .iter()
        .map(|(name, kind)| format!("{name} {kind}"))
        .collect::<Vec<_>>()
        .join(", ")
}
