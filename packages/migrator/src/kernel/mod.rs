//! Kernel module - migration infrastructure and dependencies.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::MigrationDeps;
pub use test_dependencies::{
    CountingCache, MockDomainModel, ProgressEvent, RecordingProgress, TestDependencies,
};
pub use traits::*;
