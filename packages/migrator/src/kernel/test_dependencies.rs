// TestDependencies - mock implementations for testing
//
// Provides mock collaborators that can be injected into MigrationDeps for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{BaseCache, BaseDomainModel, BaseProgress, Entity, MigrationDeps, SaveOutcome};
use crate::db::MemoryDatabase;
use crate::entity::EntityKind;

// =============================================================================
// Mock Domain Model
// =============================================================================

pub struct MockDomainModel {
    entities: Arc<Mutex<BTreeMap<(EntityKind, i64), Entity>>>,
    rejections: Arc<Mutex<HashMap<(EntityKind, i64), Vec<String>>>>,
    saves: Arc<Mutex<Vec<(EntityKind, i64)>>>,
    identity_assumed: Arc<AtomicBool>,
}

impl Default for MockDomainModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDomainModel {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(Mutex::new(BTreeMap::new())),
            rejections: Arc::new(Mutex::new(HashMap::new())),
            saves: Arc::new(Mutex::new(Vec::new())),
            identity_assumed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register an entity that `load` returns
    pub fn with_entity(self, kind: EntityKind, id: i64, entity: Entity) -> Self {
        self.entities.lock().unwrap().insert((kind, id), entity);
        self
    }

    /// Register `{"id": id}` entities for every id
    pub fn with_ids(self, kind: EntityKind, ids: impl IntoIterator<Item = i64>) -> Self {
        for id in ids {
            let mut entity = Entity::new();
            entity.insert("id".to_string(), Value::from(id));
            self.entities.lock().unwrap().insert((kind, id), entity);
        }
        self
    }

    /// Make saves of this entity fail validation with the given messages
    pub fn with_rejection(self, kind: EntityKind, id: i64, messages: &[&str]) -> Self {
        self.rejections.lock().unwrap().insert(
            (kind, id),
            messages.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Get every (kind, id) that was submitted to `save`
    pub fn saves(&self) -> Vec<(EntityKind, i64)> {
        self.saves.lock().unwrap().clone()
    }

    pub fn saved_ids(&self, kind: EntityKind) -> Vec<i64> {
        self.saves()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id)
            .collect()
    }

    pub fn identity_assumed(&self) -> bool {
        self.identity_assumed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseDomainModel for MockDomainModel {
    async fn assume_system_identity(&self) -> anyhow::Result<()> {
        self.identity_assumed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, kind: EntityKind, id: i64) -> anyhow::Result<Option<Entity>> {
        Ok(self.entities.lock().unwrap().get(&(kind, id)).cloned())
    }

    async fn save(&self, kind: EntityKind, entity: Entity) -> anyhow::Result<SaveOutcome> {
        let id = entity.get("id").and_then(Value::as_i64).unwrap_or(0);
        self.saves.lock().unwrap().push((kind, id));

        match self.rejections.lock().unwrap().get(&(kind, id)) {
            Some(messages) => Ok(SaveOutcome::Rejected(messages.clone())),
            None => Ok(SaveOutcome::Saved),
        }
    }
}

// =============================================================================
// Recording Progress
// =============================================================================

/// A progress call captured by [`RecordingProgress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Title(String),
    Text(String),
    Note(String),
    Start(Option<u64>),
    Advance,
    Finish,
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Title(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn notes(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Note(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn advances(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| **event == ProgressEvent::Advance)
            .count()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl BaseProgress for RecordingProgress {
    fn title(&self, text: &str) {
        self.push(ProgressEvent::Title(text.to_string()));
    }

    fn text(&self, text: &str) {
        self.push(ProgressEvent::Text(text.to_string()));
    }

    fn note(&self, text: &str) {
        self.push(ProgressEvent::Note(text.to_string()));
    }

    fn start(&self, total: Option<u64>) {
        self.push(ProgressEvent::Start(total));
    }

    fn advance(&self) {
        self.push(ProgressEvent::Advance);
    }

    fn finish(&self) {
        self.push(ProgressEvent::Finish);
    }
}

// =============================================================================
// Counting Cache
// =============================================================================

pub struct CountingCache {
    name: String,
    resets: AtomicUsize,
}

impl CountingCache {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resets: AtomicUsize::new(0),
        }
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl BaseCache for CountingCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub db: Arc<MemoryDatabase>,
    pub domain: Arc<MockDomainModel>,
    pub progress: Arc<RecordingProgress>,
    pub cache: Arc<CountingCache>,
    pub page_size: u32,
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            db: Arc::new(MemoryDatabase::new()),
            domain: Arc::new(MockDomainModel::new()),
            progress: Arc::new(RecordingProgress::new()),
            cache: Arc::new(CountingCache::new("routes")),
            page_size: crate::engine::DEFAULT_PAGE_SIZE,
        }
    }

    /// Use a pre-seeded database
    pub fn with_database(mut self, db: MemoryDatabase) -> Self {
        self.db = Arc::new(db);
        self
    }

    /// Set a mock domain model
    pub fn with_domain(mut self, domain: MockDomainModel) -> Self {
        self.domain = Arc::new(domain);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Build MigrationDeps wired to these mocks
    pub fn deps(&self) -> MigrationDeps {
        MigrationDeps::new(self.db.clone(), self.progress.clone())
            .with_domain(self.domain.clone())
            .with_cache(self.cache.clone())
            .with_page_size(self.page_size)
    }

    /// Like [`deps`](Self::deps) but without an admin model
    pub fn deps_without_domain(&self) -> MigrationDeps {
        MigrationDeps::new(self.db.clone(), self.progress.clone())
            .with_cache(self.cache.clone())
            .with_page_size(self.page_size)
    }
}
