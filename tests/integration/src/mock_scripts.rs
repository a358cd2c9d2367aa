//! Scripted migrations for integration testing
//!
//! Registered under a migration name, these stand in for the SQL file and
//! record what the runner asked them to do.

use async_trait::async_trait;
use chronicle_migrations::{DatabasePool, MigrationError, MigrationScript, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared log of script calls, e.g. `"up:seed"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call
    pub fn push(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    /// Calls so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

/// Script that succeeds and records every call
pub struct RecordingScript {
    name: String,
    log: CallLog,
}

impl RecordingScript {
    /// Create a script that logs as `name`
    pub fn new(name: impl Into<String>, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            log: log.clone(),
        })
    }
}

#[async_trait]
impl MigrationScript for RecordingScript {
    async fn apply(&self, _db: &DatabasePool) -> Result<()> {
        self.log.push(format!("up:{}", self.name));
        Ok(())
    }

    async fn revert(&self, _db: &DatabasePool) -> Result<()> {
        self.log.push(format!("down:{}", self.name));
        Ok(())
    }
}

/// Which direction a [`FailingScript`] fails in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Fail on apply
    Apply,
    /// Fail on revert
    Revert,
}

/// Script that fails in one direction
pub struct FailingScript {
    fail_on: FailOn,
    log: CallLog,
}

impl FailingScript {
    /// Create a script failing on `fail_on`
    pub fn new(fail_on: FailOn, log: &CallLog) -> Arc<Self> {
        Arc::new(Self {
            fail_on,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl MigrationScript for FailingScript {
    async fn apply(&self, _db: &DatabasePool) -> Result<()> {
        self.log.push("up:failing");
        if self.fail_on == FailOn::Apply {
            return Err(MigrationError::Statement("scripted apply failure".to_string()));
        }
        Ok(())
    }

    async fn revert(&self, _db: &DatabasePool) -> Result<()> {
        self.log.push("down:failing");
        if self.fail_on == FailOn::Revert {
            return Err(MigrationError::Statement("scripted revert failure".to_string()));
        }
        Ok(())
    }
}
