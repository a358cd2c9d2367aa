//! Database connection pool and the catalog queries the engine needs.

use crate::config::{DatabaseType, MigrationConfig};
use crate::error::{MigrationError, Result};
use serde::Serialize;
use sqlx::any::AnyPoolOptions;
use sqlx::{Any, AnyPool, Row, Transaction};
use std::sync::Arc;
use tracing::debug;

/// Column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type, as the database spells it.
    pub data_type: String,
}

impl ColumnInfo {
    /// Create a column description.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Coarse type family of the declared type.
    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        ColumnKind::from_declared(&self.data_type)
    }
}

/// Coarse column type family, comparable across databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Any integer type.
    Integer,
    /// Any character type.
    String,
    /// Anything else.
    Other,
}

impl ColumnKind {
    /// Classify a declared type such as `BIGINT` or `character varying`.
    #[must_use]
    pub fn from_declared(declared: &str) -> Self {
        let declared = declared.to_ascii_uppercase();
        if declared.contains("INT") || declared == "BIGSERIAL" || declared == "SERIAL" {
            Self::Integer
        } else if declared.contains("CHAR") || declared.contains("TEXT") || declared.contains("CLOB") {
            Self::String
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::String => write!(f, "string"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Quote an identifier for use in SQL text.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Database connection pool.
pub struct DatabasePool {
    pool: AnyPool,
    database_type: DatabaseType,
    config: Arc<MigrationConfig>,
}

impl DatabasePool {
    /// Create a new database pool.
    pub async fn new(config: MigrationConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        // Every connection to an in-memory SQLite URL opens its own database.
        let in_memory = config.database_url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { config.max_connections };

        let mut pool_options = AnyPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(config.connect_timeout);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect(&config.database_url)
            .await
            .map_err(|e| MigrationError::Connection(e.to_string()))?;

        debug!(database_type = %config.database_type, max_connections, "Connected");

        Ok(Self {
            pool,
            database_type: config.database_type,
            config: Arc::new(config),
        })
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub fn inner(&self) -> &AnyPool {
        &self.pool
    }

    /// Get the database type.
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Test the connection.
    pub async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| MigrationError::Connection(e.to_string()))?;

        Ok(())
    }

    /// Start a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Any>> {
        Ok(self.pool.begin().await?)
    }

    /// Execute one statement outside any transaction.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Execute a multi-statement script inside one transaction.
    ///
    /// The script goes to the database unsplit, so semicolons inside string
    /// literals and `$$` bodies are left alone.
    pub async fn execute_script(&self, sql: &str) -> Result<()> {
        if sql.trim().is_empty() {
            return Ok(());
        }

        let mut tx = self.begin().await?;
        debug!(bytes = sql.len(), "Executing script");
        sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(sql)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// List every user table, sorted by name.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = match self.database_type {
            DatabaseType::PostgreSQL => {
                "SELECT tablename::text AS name FROM pg_catalog.pg_tables \
                 WHERE schemaname = current_schema() ORDER BY tablename"
            }
            DatabaseType::SQLite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    /// Check whether a table exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.list_tables().await?.iter().any(|t| t == table))
    }

    /// Describe a table's columns in declaration order.
    pub async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = match self.database_type {
            DatabaseType::PostgreSQL => {
                sqlx::query(
                    "SELECT column_name::text AS name, data_type::text AS type \
                     FROM information_schema.columns \
                     WHERE table_schema = current_schema() AND table_name = $1 \
                     ORDER BY ordinal_position",
                )
                .bind(table)
                .fetch_all(&self.pool)
                .await?
            }
            DatabaseType::SQLite => {
                sqlx::query(&format!("PRAGMA table_info({})", quote_identifier(table)))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| -> Result<ColumnInfo> {
                Ok(ColumnInfo {
                    name: row.try_get("name")?,
                    data_type: row.try_get("type")?,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("database_type", &self.database_type)
            .field("size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .finish()
    }
}
