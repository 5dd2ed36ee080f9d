// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no migration logic.
// Migration steps are plain structs that drive these traits.
//
// Naming convention: Base* for trait names (e.g., BaseDatabase, BaseProgress)

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::db::{Assignment, ColumnSpec, Filter, IndexInfo, IndexSpec, PageRequest, Row};
use crate::entity::EntityKind;
use crate::error::Result;

// =============================================================================
// Database Trait (Infrastructure - schema metadata, DDL and row access)
// =============================================================================

#[async_trait]
pub trait BaseDatabase: Send + Sync {
    /// Column name -> declared type, in table order.
    /// Fails with `UnknownTable` when the table does not exist.
    async fn list_columns(&self, table: &str) -> Result<IndexMap<String, String>>;

    /// One entry per (index, column) pair
    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexInfo>>;

    async fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<()>;

    async fn modify_column(&self, table: &str, column: &ColumnSpec) -> Result<()>;

    async fn add_index(&self, table: &str, index: &IndexSpec) -> Result<()>;

    async fn drop_column(&self, table: &str, column: &str) -> Result<()>;

    async fn drop_index(&self, table: &str, index: &str) -> Result<()>;

    /// Drop a table; absent tables are not an error
    async fn drop_table(&self, table: &str) -> Result<()>;

    async fn count_rows(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    /// One keyset page, ordered by primary key ascending
    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<Row>>;

    /// First matching row, projected to `columns`
    async fn fetch_one(
        &self,
        table: &str,
        columns: &[String],
        filters: &[Filter],
    ) -> Result<Option<Row>>;

    /// Up to `limit` primary keys greater than `after`, ascending
    async fn next_primary_keys(&self, table: &str, after: i64, limit: u32) -> Result<Vec<i64>>;

    /// Integer values of `column` for every matching row
    async fn select_ints(&self, table: &str, column: &str, filters: &[Filter])
        -> Result<Vec<i64>>;

    async fn exists(&self, table: &str, filters: &[Filter]) -> Result<bool>;

    async fn update_by_id(&self, table: &str, id: i64, values: &Row) -> Result<()>;

    /// Bulk update; returns affected rows
    async fn update_where(
        &self,
        table: &str,
        assignments: &[Assignment],
        filters: &[Filter],
    ) -> Result<u64>;

    async fn insert(&self, table: &str, values: &Row) -> Result<()>;

    /// Drop open sessions and statement handles; the next call reconnects
    async fn disconnect(&self) -> Result<()>;
}

// =============================================================================
// Domain Model Trait (Application - admin model load/save pipeline)
// =============================================================================

/// Entity data as the admin model exchanges it.
pub type Entity = serde_json::Map<String, serde_json::Value>;

/// Result of submitting an entity to the admin model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Validation or business errors, in the order the model reported them
    Rejected(Vec<String>),
}

#[async_trait]
pub trait BaseDomainModel: Send + Sync {
    /// Switch to the system identity; resaves are maintenance, not user edits
    async fn assume_system_identity(&self) -> anyhow::Result<()>;

    /// Load an entity by primary key (None if it does not exist)
    async fn load(&self, kind: EntityKind, id: i64) -> anyhow::Result<Option<Entity>>;

    /// Run a full save through business-side field computation
    async fn save(&self, kind: EntityKind, entity: Entity) -> anyhow::Result<SaveOutcome>;
}

// =============================================================================
// Progress Trait (Observational - console or log rendering)
// =============================================================================

pub trait BaseProgress: Send + Sync {
    /// Section heading (one per step)
    fn title(&self, text: &str);

    /// Sub-task line
    fn text(&self, text: &str);

    /// Operator-facing remark (e.g. "structure is correct")
    fn note(&self, text: &str);

    /// Begin a bar; `None` for an indeterminate one
    fn start(&self, total: Option<u64>);

    fn advance(&self);

    fn finish(&self);
}

// =============================================================================
// Cache Trait (Application - process-wide derived data)
// =============================================================================

/// Named cache of derived data (routes, params, users) that a transform or
/// save may warm. Reset between pages to bound memory.
pub trait BaseCache: Send + Sync {
    fn name(&self) -> &str;

    fn reset(&self);
}
