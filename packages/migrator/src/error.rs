//! Typed errors for the migration engine.
//!
//! Uses `thiserror` for engine errors (not `anyhow`) so callers can tell a
//! failed DDL statement from malformed legacy data or a rejected domain save.

use thiserror::Error;

use crate::entity::EntityKind;

/// Errors that abort a migration step.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A DDL statement failed (permissions, lock timeout, bad definition)
    #[error("schema change on `{table}` ({object}) failed: {reason}")]
    Schema {
        table: String,
        object: String,
        reason: String,
    },

    /// Legacy data could not be coerced to a safe default
    #[error("malformed data in {context}: {reason}")]
    Data { context: String, reason: String },

    /// The domain model rejected a save; every reported message is kept
    #[error("{kind} {id} could not be saved:\n{}", .messages.join("\n"))]
    Save {
        kind: EntityKind,
        id: i64,
        messages: Vec<String>,
    },

    /// Database driver error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The domain model collaborator failed outside of validation
    #[error("domain model error: {0}")]
    Domain(#[source] anyhow::Error),

    /// Table metadata could not be read because the table does not exist
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// Storage-level failure that is not a driver error
    #[error("storage error: {0}")]
    Storage(String),

    /// A page came back out of primary-key order
    #[error("scan of `{table}` is not ascending: {next} after {previous}")]
    CursorOrder {
        table: String,
        previous: i64,
        next: i64,
    },

    /// A step needs a collaborator that was not wired in
    #[error("{0} is not configured")]
    MissingCollaborator(&'static str),

    /// A step failed; the runner stops here
    #[error("step `{step}` failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<MigrationError>,
    },
}

impl MigrationError {
    /// Build a data error for a specific row.
    pub fn data(table: &str, id: i64, reason: impl std::fmt::Display) -> Self {
        Self::Data {
            context: format!("`{}` row {}", table, id),
            reason: reason.to_string(),
        }
    }

    /// Unwrap the runner's step wrapper, if any.
    pub fn root(&self) -> &MigrationError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
