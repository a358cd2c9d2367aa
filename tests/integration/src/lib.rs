//! Integration tests for the chronicle migration engine
//!
//! This crate exercises the runner end to end against SQLite databases:
//! - `up` target windows and idempotence
//! - `down` by date, `last` and `all`
//! - `reset` with and without dropping tables
//! - `rebuild` and halting on failure
//! - Ledger validation and repair
//! - Run locking

pub mod fixtures;
pub mod mock_scripts;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_scripts::*;

#[cfg(test)]
mod ledger_tests;
#[cfg(test)]
mod rebuild_tests;
#[cfg(test)]
mod reset_tests;
#[cfg(test)]
mod up_tests;
