//! Destructive schema operations.

use crate::config::DatabaseType;
use crate::error::{MigrationError, Result};
use crate::pool::{quote_identifier, DatabasePool};
use std::sync::Arc;
use tracing::{debug, info};

/// Drops application tables while leaving bookkeeping tables alone.
#[derive(Debug, Clone)]
pub struct SchemaAdmin {
    pool: Arc<DatabasePool>,
    protected: Vec<String>,
}

impl SchemaAdmin {
    /// Create an admin that never drops any of `protected`.
    pub fn new(pool: Arc<DatabasePool>, protected: impl IntoIterator<Item = String>) -> Self {
        Self {
            pool,
            protected: protected.into_iter().collect(),
        }
    }

    /// Tables that `drop_all` would drop, sorted by name.
    pub async fn droppable_tables(&self) -> Result<Vec<String>> {
        let tables = self.pool.list_tables().await?;
        Ok(tables
            .into_iter()
            .filter(|table| !self.protected.contains(table))
            .collect())
    }

    /// Drop every droppable table in one transaction.
    ///
    /// Either every table is dropped or none is: the first failure rolls the
    /// transaction back and is returned as [`MigrationError::DropFailed`].
    /// On SQLite foreign keys are checked at commit, so linked tables can be
    /// dropped in name order.
    pub async fn drop_all(&self) -> Result<Vec<String>> {
        let tables = self.droppable_tables().await?;
        if tables.is_empty() {
            info!("No tables to drop");
            return Ok(tables);
        }

        let mut tx = self.pool.begin().await?;

        if self.pool.database_type() == DatabaseType::SQLite {
            sqlx::query("PRAGMA defer_foreign_keys = ON")
                .execute(&mut *tx)
                .await?;
        }

        for table in &tables {
            let sql = match self.pool.database_type() {
                DatabaseType::PostgreSQL => format!("DROP TABLE IF EXISTS {} CASCADE", quote_identifier(table)),
                DatabaseType::SQLite => format!("DROP TABLE {}", quote_identifier(table)),
            };

            debug!(table = %table, "Dropping table");
            if let Err(e) = sqlx::query(&sql).execute(&mut *tx).await {
                debug!(table = %table, error = %e, "Drop failed, rolling back");
                tx.rollback().await?;
                return Err(MigrationError::DropFailed {
                    table: table.clone(),
                    reason: e.to_string(),
                });
            }
        }

        // A dangling reference into a kept table only surfaces here.
        tx.commit().await.map_err(|e| MigrationError::DropFailed {
            table: tables.last().cloned().unwrap_or_default(),
            reason: e.to_string(),
        })?;

        info!(count = tables.len(), "Dropped tables");
        Ok(tables)
    }
}
