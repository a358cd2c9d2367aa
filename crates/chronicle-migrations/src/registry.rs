//! Explicit name to script registry.

use crate::error::{MigrationError, Result};
use crate::migration::{MigrationFile, MigrationScript, SqlScript};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registered migration scripts, keyed by migration name.
///
/// Names without a registration fall back to the SQL in the migration file
/// itself, provided the file is readable.
#[derive(Default, Clone)]
pub struct MigrationRegistry {
    scripts: HashMap<String, Arc<dyn MigrationScript>>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script under a migration name, replacing any earlier one.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        script: Arc<dyn MigrationScript>,
    ) -> &mut Self {
        self.scripts.insert(name.into(), script);
        self
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, script: Arc<dyn MigrationScript>) -> Self {
        self.register(name, script);
        self
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// Number of registered scripts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.scripts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Find the script for a migration file.
    pub async fn resolve(&self, file: &MigrationFile) -> Result<Arc<dyn MigrationScript>> {
        if let Some(script) = self.scripts.get(&file.name) {
            debug!(name = %file.name, "Using registered script");
            return Ok(Arc::clone(script));
        }

        if !file.path.is_file() {
            return Err(MigrationError::resolution(
                &file.name,
                format!(
                    "no script is registered and {} does not exist",
                    file.path.display()
                ),
            ));
        }

        let script = SqlScript::load(&file.path)
            .await
            .map_err(|e| MigrationError::resolution(&file.name, e.to_string()))?;
        Ok(Arc::new(script))
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("scripts", &self.names())
            .finish()
    }
}
