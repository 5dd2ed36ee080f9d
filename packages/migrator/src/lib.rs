//! Batched, idempotent schema evolution and data backfill for the RadicalMart
//! catalog.
//!
//! # Modules
//!
//! - [`engine`]: idempotent DDL, keyset scans, resaves and the step runner
//! - [`data_migrations`]: versioned migrations (`3.0.0`)
//! - [`db`]: MySQL and in-memory backends
//! - [`kernel`]: collaborator traits, dependency container and test mocks

pub mod config;
pub mod data_migrations;
pub mod db;
pub mod engine;
pub mod entity;
pub mod error;
pub mod kernel;
pub mod progress;
pub mod registry;

pub use config::Config;
pub use data_migrations::{all_migrations, find_migration, Migration, MigrationEntry};
pub use engine::{MigrationRunner, MigrationStep, RunReport, StepSummary};
pub use error::{MigrationError, Result};
pub use kernel::MigrationDeps;
