//! Batched migration engine: idempotent DDL, legacy column detection, keyset
//! scans, resource release, resaves and the step runner.

pub mod detector;
pub mod release;
pub mod resave;
pub mod runner;
pub mod scanner;
pub mod schema;

pub use detector::{detect_backfill_columns, Selection};
pub use release::{CacheRegistry, ResourceReleaser};
pub use resave::ResaveDriver;
pub use runner::{MigrationRunner, MigrationStep, RunReport, RunState, StepReport, StepSummary};
pub use scanner::{CursorScanner, PageVisitor, ScanCursor, DEFAULT_PAGE_SIZE};
pub use schema::SchemaEditor;
