//! Migration runner.

use crate::admin::SchemaAdmin;
use crate::config::MigrationConfig;
use crate::error::{MigrationError, Result};
use crate::lock::{LockGuard, LockHolder, RunLock};
use crate::migration::{Direction, MigrationFile, MigrationRecord};
use crate::pool::DatabasePool;
use crate::registry::MigrationRegistry;
use crate::repository::MigrationRepository;
use crate::store::{LedgerState, VersionStore};
use crate::version::{format_stamp, DownTarget, UpTarget};
use chrono::Utc;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runner operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Apply pending migrations.
    Up,
    /// Revert applied migrations.
    Down,
    /// Revert everything, optionally dropping every table.
    Reset,
    /// Reset, then apply everything.
    Rebuild,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Reset => write!(f, "reset"),
            Self::Rebuild => write!(f, "rebuild"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The run finished its work list.
    Completed,
    /// There was nothing to do.
    NothingToDo,
}

/// One migration applied or reverted during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Migration version.
    pub version: i64,
    /// Version rendered as `YYYYMMDDHHMMSS`.
    pub stamp: String,
    /// Migration name.
    pub name: String,
    /// Whether the step applied or reverted.
    pub direction: Direction,
    /// Wall time spent on the step.
    pub execution_time_ms: i64,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Operation that ran.
    pub operation: Operation,
    /// How it ended.
    pub outcome: RunOutcome,
    /// Steps executed, in order.
    pub steps: Vec<StepReport>,
    /// Tables dropped by a forced reset.
    pub dropped_tables: Vec<String>,
    /// Highest applied version after the run.
    pub last_version: i64,
}

impl RunReport {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            outcome: RunOutcome::NothingToDo,
            steps: Vec::new(),
            dropped_tables: Vec::new(),
            last_version: 0,
        }
    }

    /// Number of migrations applied.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.steps.iter().filter(|s| s.direction == Direction::Up).count()
    }

    /// Number of migrations reverted.
    #[must_use]
    pub fn reverted(&self) -> usize {
        self.steps.iter().filter(|s| s.direction == Direction::Down).count()
    }

    /// One-line summary for people.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match (self.operation, self.outcome) {
            (Operation::Up, _) => "All updated.",
            (Operation::Down, RunOutcome::NothingToDo) => "No version installed.",
            (Operation::Down, RunOutcome::Completed) => "All down.",
            (Operation::Reset, _) => "Reset complete.",
            (Operation::Rebuild, _) => "Rebuild complete.",
        }
    }
}

/// State of one migration in a [`StatusReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    /// Recorded in the ledger.
    Applied,
    /// Newer than the last applied version; `up` will run it.
    Pending,
    /// Older than the last applied version but never applied; `up` skips it.
    Skipped,
    /// Recorded in the ledger but its file is gone.
    Missing,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Pending => write!(f, "pending"),
            Self::Skipped => write!(f, "skipped"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// One row of a [`StatusReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Migration version.
    pub version: i64,
    /// Version rendered as `YYYYMMDDHHMMSS`.
    pub stamp: String,
    /// Migration name.
    pub name: String,
    /// Current state.
    pub state: MigrationState,
    /// Epoch seconds when the ledger row was written.
    pub applied_at: Option<i64>,
}

/// Applied and available migrations side by side.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Highest applied version, or 0.
    pub last_version: i64,
    /// One entry per known migration, ascending by version.
    pub entries: Vec<StatusEntry>,
}

impl StatusReport {
    /// Entries in a given state.
    pub fn with_state(&self, state: MigrationState) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter().filter(move |e| e.state == state)
    }
}

/// Migration runner.
pub struct MigrationRunner {
    pool: Arc<DatabasePool>,
    config: Arc<MigrationConfig>,
    store: VersionStore,
    repository: MigrationRepository,
    registry: MigrationRegistry,
    admin: SchemaAdmin,
    lock: RunLock,
    ledger_state: LedgerState,
}

impl MigrationRunner {
    /// Connect to the configured database and prepare the runner.
    pub async fn connect(config: MigrationConfig, registry: MigrationRegistry) -> Result<Self> {
        let pool = DatabasePool::new(config.clone()).await?;
        Self::with_pool(Arc::new(pool), config, registry).await
    }

    /// Prepare a runner over an existing pool.
    ///
    /// Checks the migrations directory, then creates or validates the ledger
    /// and the lock table.
    pub async fn with_pool(
        pool: Arc<DatabasePool>,
        config: MigrationConfig,
        registry: MigrationRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let repository = MigrationRepository::new(&config.migrations_path, &config.extension)?;
        repository.check()?;

        let store = VersionStore::new(Arc::clone(&pool), &config.table_name, config.ledger_repair);
        let lock = RunLock::new(Arc::clone(&pool), config.lock_table_name(), config.use_lock);
        let admin = SchemaAdmin::new(
            Arc::clone(&pool),
            [config.table_name.clone(), config.lock_table_name()],
        );

        let ledger_state = store.ensure_table().await?;
        lock.ensure_table().await?;

        debug!(
            table = %config.table_name,
            path = %config.migrations_path.display(),
            registered = registry.len(),
            "Runner ready"
        );

        Ok(Self {
            pool,
            config: Arc::new(config),
            store,
            repository,
            registry,
            admin,
            lock,
            ledger_state,
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<DatabasePool> {
        &self.pool
    }

    /// Get the ledger.
    #[must_use]
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Get the migration directory.
    #[must_use]
    pub fn repository(&self) -> &MigrationRepository {
        &self.repository
    }

    /// What preparing the ledger did.
    #[must_use]
    pub fn ledger_state(&self) -> LedgerState {
        self.ledger_state
    }

    /// Highest applied version, or 0.
    pub async fn last_version(&self) -> Result<i64> {
        self.store.last_version().await
    }

    /// Apply every migration newer than the last applied version, up to `target`.
    pub async fn up(&self, target: UpTarget) -> Result<RunReport> {
        let guard = self.lock.acquire().await?;
        let result = self.run_up(target).await;
        self.release(guard).await;
        result
    }

    /// Revert applied migrations newer than `target`, newest first.
    pub async fn down(&self, target: DownTarget) -> Result<RunReport> {
        let guard = self.lock.acquire().await?;
        let result = self.run_down(target).await;
        self.release(guard).await;
        result
    }

    /// Revert everything. With `force`, also drop every other table.
    pub async fn reset(&self, force: bool) -> Result<RunReport> {
        let guard = self.lock.acquire().await?;
        let result = self.run_reset(force).await;
        self.release(guard).await;
        result
    }

    /// Reset, then apply everything.
    pub async fn rebuild(&self, force: bool) -> Result<RunReport> {
        let guard = self.lock.acquire().await?;
        let result = self.run_rebuild(force).await;
        self.release(guard).await;
        result
    }

    /// Files `up` would apply, in order.
    pub async fn plan_up(&self, target: UpTarget) -> Result<Vec<MigrationFile>> {
        let last_version = self.store.last_version().await?;
        let ceiling = target.ceiling();

        Ok(self
            .sorted_files()?
            .into_iter()
            .filter(|f| f.version > last_version && f.version <= ceiling)
            .collect())
    }

    /// Records `down` would revert, in order.
    pub async fn plan_down(&self, target: DownTarget) -> Result<Vec<MigrationRecord>> {
        let last_version = self.store.last_version().await?;
        if last_version == 0 {
            return Ok(Vec::new());
        }
        let threshold = target.threshold(last_version);

        Ok(self
            .store
            .list_all()
            .await?
            .into_iter()
            .rev()
            .take_while(|r| r.version > threshold)
            .collect())
    }

    /// Ledger and directory side by side.
    pub async fn status(&self) -> Result<StatusReport> {
        let records = self.store.list_all().await?;
        let last_version = records.last().map_or(0, |r| r.version);
        let applied: HashMap<i64, &MigrationRecord> =
            records.iter().map(|r| (r.version, r)).collect();

        let mut files = self.repository.discover()?;
        files.sort_by_key(|f| f.version);
        let on_disk: HashSet<i64> = files.iter().map(|f| f.version).collect();

        let mut entries: Vec<StatusEntry> = files
            .iter()
            .map(|file| {
                let record = applied.get(&file.version);
                let state = match record {
                    Some(_) => MigrationState::Applied,
                    None if file.version <= last_version => MigrationState::Skipped,
                    None => MigrationState::Pending,
                };
                StatusEntry {
                    version: file.version,
                    stamp: file.stamp(),
                    name: file.name.clone(),
                    state,
                    applied_at: record.map(|r| r.created),
                }
            })
            .collect();

        entries.extend(
            records
                .iter()
                .filter(|r| !on_disk.contains(&r.version))
                .map(|r| StatusEntry {
                    version: r.version,
                    stamp: r.stamp(),
                    name: r.name.clone(),
                    state: MigrationState::Missing,
                    applied_at: Some(r.created),
                }),
        );
        entries.sort_by_key(|e| e.version);

        Ok(StatusReport {
            last_version,
            entries,
        })
    }

    /// Current lock holder, if any.
    pub async fn lock_holder(&self) -> Result<Option<LockHolder>> {
        self.lock.holder().await
    }

    /// Clear a stale run lock. Returns whether one was held.
    pub async fn unlock(&self) -> Result<bool> {
        self.lock.force_release().await
    }

    async fn release(&self, guard: Option<LockGuard>) {
        if let Some(guard) = guard {
            if let Err(e) = self.lock.release(guard).await {
                warn!(error = %e, "Failed to release run lock");
            }
        }
    }

    async fn run_up(&self, target: UpTarget) -> Result<RunReport> {
        let mut report = RunReport::new(Operation::Up);
        let pending = self.plan_up(target).await?;

        if pending.is_empty() {
            info!("No pending migrations");
        } else {
            info!(count = pending.len(), "Applying migrations");
            for file in &pending {
                report.steps.push(self.apply_file(file).await?);
            }
            report.outcome = RunOutcome::Completed;
        }

        report.last_version = self.store.last_version().await?;
        Ok(report)
    }

    async fn run_down(&self, target: DownTarget) -> Result<RunReport> {
        let mut report = RunReport::new(Operation::Down);

        if self.store.last_version().await? == 0 {
            info!("No version installed");
            return Ok(report);
        }

        let records = self.plan_down(target).await?;
        info!(count = records.len(), target = %target, "Reverting migrations");
        for record in &records {
            report.steps.push(self.revert_record(record).await?);
        }

        report.outcome = RunOutcome::Completed;
        report.last_version = self.store.last_version().await?;
        Ok(report)
    }

    async fn run_reset(&self, force: bool) -> Result<RunReport> {
        let down = self.run_down(DownTarget::All).await?;

        let mut report = RunReport::new(Operation::Reset);
        report.steps = down.steps;
        report.outcome = RunOutcome::Completed;

        if force {
            report.dropped_tables = self.admin.drop_all().await?;
        }

        report.last_version = self.store.last_version().await?;
        Ok(report)
    }

    async fn run_rebuild(&self, force: bool) -> Result<RunReport> {
        let reset = self.run_reset(force).await?;
        let up = self.run_up(UpTarget::Latest).await?;

        let mut report = RunReport::new(Operation::Rebuild);
        report.steps = reset.steps;
        report.steps.extend(up.steps);
        report.dropped_tables = reset.dropped_tables;
        report.outcome = RunOutcome::Completed;
        report.last_version = up.last_version;
        Ok(report)
    }

    fn sorted_files(&self) -> Result<Vec<MigrationFile>> {
        let mut files = self.repository.discover()?;
        files.sort_by_key(|f| f.version);

        if let Some(pair) = files.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(MigrationError::DuplicateFile {
                stamp: pair[0].stamp(),
                first: pair[0].file_name(),
                second: pair[1].file_name(),
            });
        }

        Ok(files)
    }

    async fn apply_file(&self, file: &MigrationFile) -> Result<StepReport> {
        info!(version = file.version, name = %file.name, "Applying migration");
        let start = Instant::now();

        let script = self
            .registry
            .resolve(file)
            .await
            .map_err(|e| halt(file.version, &file.name, &e))?;
        script
            .apply(&self.pool)
            .await
            .map_err(|e| halt(file.version, &file.name, &e))?;
        self.store
            .append(file.version, &file.name, Utc::now().timestamp())
            .await
            .map_err(|e| halt(file.version, &file.name, &e))?;

        let execution_time_ms = elapsed_ms(start);
        info!(
            version = file.version,
            name = %file.name,
            execution_time_ms,
            "Migration applied"
        );

        Ok(StepReport {
            version: file.version,
            stamp: file.stamp(),
            name: file.name.clone(),
            direction: Direction::Up,
            execution_time_ms,
        })
    }

    async fn revert_record(&self, record: &MigrationRecord) -> Result<StepReport> {
        info!(version = record.version, name = %record.name, "Reverting migration");
        let start = Instant::now();
        let file = self.repository.expected_file(record);

        let script = self
            .registry
            .resolve(&file)
            .await
            .map_err(|e| halt(record.version, &record.name, &e))?;
        script
            .revert(&self.pool)
            .await
            .map_err(|e| halt(record.version, &record.name, &e))?;
        self.store
            .remove(record.id)
            .await
            .map_err(|e| halt(record.version, &record.name, &e))?;

        let execution_time_ms = elapsed_ms(start);
        info!(
            version = record.version,
            name = %record.name,
            execution_time_ms,
            "Migration reverted"
        );

        Ok(StepReport {
            version: record.version,
            stamp: record.stamp(),
            name: record.name.clone(),
            direction: Direction::Down,
            execution_time_ms,
        })
    }
}

impl fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("table", &self.config.table_name)
            .field("path", &self.config.migrations_path)
            .field("registry", &self.registry)
            .field("ledger_state", &self.ledger_state)
            .finish_non_exhaustive()
    }
}

fn halt(version: i64, name: &str, cause: &MigrationError) -> MigrationError {
    let stamp = format_stamp(version);
    debug!(version, stamp = %stamp, name = %name, error = %cause, "Migration failed, halting run");
    MigrationError::Execution {
        version,
        stamp,
        name: name.to_string(),
        reason: cause.to_string(),
    }
}

fn elapsed_ms(start: Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}
