//! Migration dependencies for steps (using traits for testability)
//!
//! Every step receives the same container; backends and collaborators are
//! trait objects so tests can swap in the in-memory store and mocks.

use std::sync::Arc;

use crate::engine::{CacheRegistry, CursorScanner, ResourceReleaser, SchemaEditor, DEFAULT_PAGE_SIZE};
use crate::error::{MigrationError, Result};
use crate::kernel::{BaseCache, BaseDatabase, BaseDomainModel, BaseProgress};

/// Extension element whose params the migration rewrites.
pub const DEFAULT_COMPONENT: &str = "com_radicalmart";

// =============================================================================
// MigrationDeps
// =============================================================================

/// Dependencies accessible to migration steps
#[derive(Clone)]
pub struct MigrationDeps {
    pub db: Arc<dyn BaseDatabase>,
    pub progress: Arc<dyn BaseProgress>,
    /// Admin model save pipeline; only the resave steps need it
    pub domain: Option<Arc<dyn BaseDomainModel>>,
    pub caches: CacheRegistry,
    pub page_size: u32,
    pub component: String,
}

impl MigrationDeps {
    pub fn new(db: Arc<dyn BaseDatabase>, progress: Arc<dyn BaseProgress>) -> Self {
        Self {
            db,
            progress,
            domain: None,
            caches: CacheRegistry::new(),
            page_size: DEFAULT_PAGE_SIZE,
            component: DEFAULT_COMPONENT.to_string(),
        }
    }

    pub fn with_domain(mut self, domain: Arc<dyn BaseDomainModel>) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn BaseCache>) -> Self {
        self.caches.register(cache);
        self
    }

    /// Page size for every scan; zero is clamped to one.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.component = component.to_string();
        self
    }

    pub fn schema(&self) -> SchemaEditor<'_> {
        SchemaEditor::new(self.db.as_ref(), self.progress.as_ref())
    }

    pub fn releaser(&self) -> ResourceReleaser<'_> {
        ResourceReleaser::new(self.db.as_ref(), &self.caches)
    }

    pub fn scanner(&self) -> CursorScanner<'_> {
        CursorScanner::new(self.db.as_ref(), self.releaser(), self.page_size)
    }

    /// The admin model, or `MissingCollaborator` when none was wired.
    pub fn domain_model(&self) -> Result<&dyn BaseDomainModel> {
        self.domain
            .as_deref()
            .ok_or(MigrationError::MissingCollaborator("domain model"))
    }
}
