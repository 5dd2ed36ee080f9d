//! Versioned catalog migrations
//!
//! Each migration is a fixed, hand-ordered list of steps that takes the
//! catalog from the previous major version to `version()`. There is no
//! ledger: every step checks the live structure and data itself, so a
//! migration can be re-run safely.
//!
//! # Usage
//!
//! 1. Implement the `Migration` trait for your version
//! 2. Register it in `all_migrations`
//! 3. Run via `migrate_cli run <version>`

pub mod v3_0_0;

use crate::engine::MigrationStep;

/// A catalog version upgrade.
pub trait Migration: Send + Sync + 'static {
    /// Target version (`"3.0.0"`), used as the lookup key
    fn version(&self) -> &'static str;

    /// Optional description shown in migration list
    fn description(&self) -> &'static str {
        ""
    }

    /// Steps in execution order
    fn steps(&self) -> Vec<Box<dyn MigrationStep>>;
}

/// Registry entry for a migration
pub struct MigrationEntry {
    pub migration: Box<dyn Migration>,
}

impl MigrationEntry {
    pub fn new<M: Migration>(m: M) -> Self {
        Self {
            migration: Box::new(m),
        }
    }
}

/// Get all registered migrations
///
/// Add new migrations to this function.
pub fn all_migrations() -> Vec<MigrationEntry> {
    vec![MigrationEntry::new(v3_0_0::RadicalMart300)]
}

/// Find a migration by version
pub fn find_migration(version: &str) -> Option<MigrationEntry> {
    all_migrations()
        .into_iter()
        .find(|e| e.migration.version() == version)
}
