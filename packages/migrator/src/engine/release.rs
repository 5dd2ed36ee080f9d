//! Memory release between pages: drop the database session and reset every
//! registered cache.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::kernel::{BaseCache, BaseDatabase};

/// Named caches reset by the release signal.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Vec<Arc<dyn BaseCache>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, cache: Arc<dyn BaseCache>) {
        self.caches.push(cache);
    }

    pub fn reset_all(&self) {
        for cache in &self.caches {
            cache.reset();
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.caches.iter().map(|cache| cache.name()).collect()
    }
}

pub struct ResourceReleaser<'a> {
    db: &'a dyn BaseDatabase,
    caches: &'a CacheRegistry,
}

impl<'a> ResourceReleaser<'a> {
    pub fn new(db: &'a dyn BaseDatabase, caches: &'a CacheRegistry) -> Self {
        Self { db, caches }
    }

    pub async fn release(&self) -> Result<()> {
        self.db.disconnect().await?;
        self.caches.reset_all();
        debug!(caches = ?self.caches.names(), "released database session and caches");
        Ok(())
    }
}
