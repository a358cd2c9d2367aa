//! Advisory run lock.
//!
//! The lock is a single row in `<ledger>_lock`. A run inserts the row before
//! it touches the ledger and deletes it when it finishes, so a second run
//! against the same database fails fast instead of interleaving steps.

use crate::config::DatabaseType;
use crate::error::{MigrationError, Result};
use crate::pool::{quote_identifier, DatabasePool};
use crate::version::display_version;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const LOCK_ID: i64 = 1;

/// Proof that the run lock is held.
#[derive(Debug)]
#[must_use = "the lock stays held until the guard is released"]
pub struct LockGuard {
    holder: String,
}

impl LockGuard {
    /// Token identifying this holder.
    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

/// Current holder of the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    /// Holder token.
    pub holder: String,
    /// Epoch seconds when the lock was taken.
    pub acquired: i64,
}

/// Row-based advisory lock.
#[derive(Debug, Clone)]
pub struct RunLock {
    pool: Arc<DatabasePool>,
    table: String,
    enabled: bool,
}

impl RunLock {
    /// Create a lock backed by `table`.
    pub fn new(pool: Arc<DatabasePool>, table: impl Into<String>, enabled: bool) -> Self {
        Self {
            pool,
            table: table.into(),
            enabled,
        }
    }

    /// Lock table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether runs take the lock.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Create the lock table if it does not exist.
    pub async fn ensure_table(&self) -> Result<()> {
        let table = quote_identifier(&self.table);
        let sql = match self.pool.database_type() {
            DatabaseType::PostgreSQL => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id BIGINT PRIMARY KEY,
                    holder VARCHAR(64) NOT NULL,
                    acquired BIGINT NOT NULL
                )"
            ),
            DatabaseType::SQLite => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY,
                    holder VARCHAR(64) NOT NULL,
                    acquired INTEGER NOT NULL
                )"
            ),
        };

        self.pool
            .execute(&sql)
            .await
            .map_err(|e| MigrationError::config(format!("Cannot create lock table: {e}")))?;
        Ok(())
    }

    /// Take the lock. Returns `None` when locking is disabled.
    pub async fn acquire(&self) -> Result<Option<LockGuard>> {
        if !self.enabled {
            return Ok(None);
        }

        let holder = Uuid::new_v4().to_string();
        let sql = format!(
            "INSERT INTO {} (id, holder, acquired) VALUES ($1, $2, $3)",
            quote_identifier(&self.table)
        );

        let inserted = sqlx::query(&sql)
            .bind(LOCK_ID)
            .bind(&holder)
            .bind(Utc::now().timestamp())
            .execute(self.pool.inner())
            .await;

        match inserted {
            Ok(_) => {
                debug!(holder = %holder, "Acquired run lock");
                Ok(Some(LockGuard { holder }))
            }
            Err(e) => {
                let reason = match self.holder().await {
                    Ok(Some(current)) => format!(
                        "held by {} since {}; run `unlock` if that run is gone",
                        current.holder,
                        display_version(current.acquired)
                    ),
                    _ => e.to_string(),
                };
                Err(MigrationError::LockFailed(reason))
            }
        }
    }

    /// Give the lock back.
    pub async fn release(&self, guard: LockGuard) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND holder = $2",
            quote_identifier(&self.table)
        );

        let result = sqlx::query(&sql)
            .bind(LOCK_ID)
            .bind(&guard.holder)
            .execute(self.pool.inner())
            .await
            .map_err(MigrationError::store)?;

        if result.rows_affected() == 0 {
            warn!(holder = %guard.holder, "Run lock was already cleared");
        } else {
            debug!(holder = %guard.holder, "Released run lock");
        }
        Ok(())
    }

    /// Clear the lock regardless of who holds it. Returns whether a lock was held.
    pub async fn force_release(&self) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", quote_identifier(&self.table));

        let result = sqlx::query(&sql)
            .bind(LOCK_ID)
            .execute(self.pool.inner())
            .await
            .map_err(MigrationError::store)?;

        let cleared = result.rows_affected() > 0;
        if cleared {
            info!(table = %self.table, "Cleared run lock");
        }
        Ok(cleared)
    }

    /// Who holds the lock, if anyone.
    pub async fn holder(&self) -> Result<Option<LockHolder>> {
        let sql = format!(
            "SELECT holder, acquired FROM {} WHERE id = $1",
            quote_identifier(&self.table)
        );

        let row = sqlx::query(&sql)
            .bind(LOCK_ID)
            .fetch_optional(self.pool.inner())
            .await
            .map_err(MigrationError::store)?;

        row.map(|row| -> Result<LockHolder> {
            Ok(LockHolder {
                holder: row.try_get("holder").map_err(MigrationError::store)?,
                acquired: row.try_get("acquired").map_err(MigrationError::store)?,
            })
        })
        .transpose()
    }
}
