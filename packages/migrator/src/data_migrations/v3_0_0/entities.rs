//! Product and meta-variant structure steps: new columns, backfill from the
//! legacy columns, then removal of everything legacy.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::transforms::{
    changed_columns, member_product_ids, meta_patch, ordering_entry, parse_blob, product_patch,
    variability_fields, VariabilityFields, SQL_DATETIME,
};
use crate::db::{row_id, Assignment, ColumnSpec, Filter, IndexSpec, Row, SqlValue};
use crate::engine::{detect_backfill_columns, MigrationStep, PageVisitor, StepSummary};
use crate::entity::{EntityKind, CATEGORIES_ITEMS_TABLE, FIELDS_TABLE, PRODUCTS_TABLE};
use crate::error::Result;
use crate::kernel::MigrationDeps;

// =============================================================================
// Layout
// =============================================================================

/// Target structure and legacy leftovers of an entity table.
struct EntityLayout {
    columns: Vec<ColumnSpec>,
    indexes: Vec<IndexSpec>,
    /// Legacy columns the backfill reads
    legacy: &'static [&'static str],
    /// Always selected; includes the backfilled target columns
    base: &'static [&'static str],
    drop_columns: &'static [&'static str],
    drop_indexes: &'static [&'static str],
    drop_tables: &'static [&'static str],
}

fn unsigned_id(name: &str, after: &str) -> ColumnSpec {
    ColumnSpec::new(name, "int(10) unsigned")
        .not_null()
        .default("0")
        .after(after)
}

/// User reference columns, already in the shape `update_users_columns` leaves.
fn user_id(name: &str, after: &str) -> ColumnSpec {
    ColumnSpec::new(name, "int(10)")
        .not_null()
        .default("0")
        .after(after)
}

fn category_columns() -> Vec<ColumnSpec> {
    vec![
        unsigned_id("category_pathway", "category"),
        unsigned_id("category_route", "category_pathway"),
        ColumnSpec::new("categories_additional", "text").after("category_route"),
        ColumnSpec::new("categories_all", "text").after("categories_additional"),
    ]
}

impl EntityLayout {
    fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Product => {
                let mut columns = category_columns();
                columns.push(unsigned_id("meta_variability", "categories_all"));
                columns.push(ColumnSpec::new("changelogs", "json").after("params"));

                Self {
                    columns,
                    indexes: vec![IndexSpec::new("idx_meta_variability", &["meta_variability"])],
                    legacy: &["categories", "pathway", "ordering"],
                    base: &["id", "category", "category_pathway", "categories_additional"],
                    drop_columns: &["categories", "pathway", "ordering", "ordering_price"],
                    drop_indexes: &["idx_pathway", "idx_ordering", "idx_ordering_price"],
                    drop_tables: &["#__radicalmart_products_categories"],
                }
            }
            EntityKind::Meta => {
                let mut columns = category_columns();
                columns.extend([
                    user_id("created_by", "created"),
                    ColumnSpec::new("modified", "datetime").after("created_by"),
                    user_id("modified_by", "modified"),
                    ColumnSpec::new("fulltext", "mediumtext").after("introtext"),
                    ColumnSpec::new("search_text", "longtext").after("fulltext"),
                    ColumnSpec::new("stock", "json").after("prices"),
                    ColumnSpec::new("in_stock", "tinyint(3)")
                        .not_null()
                        .default("1")
                        .after("stock"),
                    ColumnSpec::new("fields", "json").after("in_stock"),
                ]);

                Self {
                    columns,
                    indexes: vec![IndexSpec::new("idx_in_stock", &["in_stock"])],
                    legacy: &["categories", "ordering"],
                    base: &[
                        "id",
                        "category",
                        "products",
                        "params",
                        "created",
                        "categories_additional",
                    ],
                    drop_columns: &["categories", "ordering", "ordering_price"],
                    drop_indexes: &["idx_ordering", "idx_ordering_price"],
                    drop_tables: &["#__radicalmart_metas_categories"],
                }
            }
        }
    }
}

// =============================================================================
// Step
// =============================================================================

pub struct EntityStructureStep {
    kind: EntityKind,
}

impl EntityStructureStep {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl MigrationStep for EntityStructureStep {
    fn name(&self) -> &'static str {
        match self.kind {
            EntityKind::Product => "update_products_structure",
            EntityKind::Meta => "update_metas_structure",
        }
    }

    fn title(&self) -> &'static str {
        match self.kind {
            EntityKind::Product => "Update products structure",
            EntityKind::Meta => "Update meta products structure",
        }
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        let kind = self.kind;
        let table = kind.table();
        let layout = EntityLayout::of(kind);
        let schema = deps.schema();

        let mut summary = StepSummary::default().with_ddl(
            schema
                .ensure_structure(table, &layout.columns, &layout.indexes)
                .await?,
        );

        deps.progress.text("Get total items");
        let total = deps.db.count_rows(table, &[]).await?;
        if total == 0 {
            deps.progress
                .note(&format!("{} not found", kind.plural_label()));
        }

        match detect_backfill_columns(deps.db.as_ref(), table, layout.legacy, layout.base).await? {
            None => {
                deps.progress
                    .note(&format!("{} structure is correct", kind.plural_label()));
            }
            Some(selection) => {
                deps.progress.text("Paste data to new columns");
                deps.progress.start(Some(total));

                let mut backfill = EntityBackfill::new(kind, deps);
                deps.scanner()
                    .scan(table, selection.columns(), &[], &mut backfill)
                    .await?;
                deps.progress.finish();

                let done = backfill.summary;
                if done.rows_skipped > 0 {
                    warn!(
                        table = %table,
                        skipped = done.rows_skipped,
                        "variability fields left unresolved"
                    );
                    deps.progress.note(&format!(
                        "{} meta products have variability fields that could not be resolved",
                        done.rows_skipped
                    ));
                }
                info!(
                    table = %table,
                    scanned = done.rows_scanned,
                    updated = done.rows_updated,
                    inserted = done.rows_inserted,
                    "backfill finished"
                );
                summary.merge(done);
            }
        }

        summary.ddl_statements += schema
            .drop_structure(table, layout.drop_columns, layout.drop_indexes)
            .await? as u64;
        summary.ddl_statements += schema.drop_tables_if_exist(layout.drop_tables).await? as u64;

        Ok(summary.settle())
    }
}

// =============================================================================
// Backfill
// =============================================================================

struct EntityBackfill<'a> {
    kind: EntityKind,
    deps: &'a MigrationDeps,
    now: String,
    summary: StepSummary,
}

impl<'a> EntityBackfill<'a> {
    fn new(kind: EntityKind, deps: &'a MigrationDeps) -> Self {
        Self {
            kind,
            deps,
            now: Utc::now().format(SQL_DATETIME).to_string(),
            summary: StepSummary::default(),
        }
    }

    /// New params blob when legacy variability aliases resolve to field ids.
    async fn resolve_variability(&mut self, row: &Row) -> Result<Option<String>> {
        let table = self.kind.table();
        let mut params = parse_blob(table, row, "params")?;

        let aliases = match variability_fields(&params) {
            VariabilityFields::Absent | VariabilityFields::Resolved => return Ok(None),
            VariabilityFields::Unrecognized => {
                self.summary.rows_skipped += 1;
                return Ok(None);
            }
            VariabilityFields::Aliases(aliases) => aliases,
        };

        if aliases.is_empty() {
            self.summary.rows_skipped += 1;
            return Ok(None);
        }

        let filter = Filter::In(
            "alias".into(),
            aliases.into_iter().map(SqlValue::Text).collect(),
        );
        let ids = self.deps.db.select_ints(FIELDS_TABLE, "id", &[filter]).await?;
        if ids.is_empty() {
            self.summary.rows_skipped += 1;
            return Ok(None);
        }

        params.set(
            "variability_fields",
            Value::Array(ids.into_iter().map(Value::from).collect()),
        );
        Ok(Some(params.to_blob()))
    }

    async fn insert_ordering(&mut self, id: i64, row: &Row) -> Result<()> {
        let entry = match ordering_entry(self.kind, id, row) {
            Some(entry) => entry,
            None => return Ok(()),
        };

        let db = self.deps.db.as_ref();
        if !db.exists(CATEGORIES_ITEMS_TABLE, &entry.lookup()).await? {
            db.insert(CATEGORIES_ITEMS_TABLE, &entry.to_row()).await?;
            self.summary.rows_inserted += 1;
        }
        Ok(())
    }

    /// Point every member product at this meta.
    async fn link_products(&mut self, id: i64, row: &Row) -> Result<()> {
        let products = parse_blob(self.kind.table(), row, "products")?;
        let members = member_product_ids(&products);
        if members.is_empty() {
            return Ok(());
        }

        let updated = self
            .deps
            .db
            .update_where(
                PRODUCTS_TABLE,
                &[Assignment::Value("meta_variability".into(), SqlValue::Int(id))],
                &[
                    Filter::In("id".into(), members.into_iter().map(SqlValue::Int).collect()),
                    Filter::NotEq("meta_variability".into(), SqlValue::Int(id)),
                ],
            )
            .await?;
        self.summary.rows_updated += updated;
        Ok(())
    }
}

#[async_trait]
impl PageVisitor for EntityBackfill<'_> {
    async fn visit_page(&mut self, rows: Vec<Row>) -> Result<()> {
        let table = self.kind.table();

        for row in rows {
            let id = row_id(&row);
            self.summary.rows_scanned += 1;

            let patch = match self.kind {
                EntityKind::Product => product_patch(&row),
                EntityKind::Meta => {
                    let mut patch = meta_patch(&row, &self.now);
                    if let Some(params) = self.resolve_variability(&row).await? {
                        patch.insert("params".into(), SqlValue::Text(params));
                    }
                    patch
                }
            };

            let changes = changed_columns(&row, patch);
            if !changes.is_empty() {
                self.deps.db.update_by_id(table, id, &changes).await?;
                self.summary.rows_updated += 1;
            }

            self.insert_ordering(id, &row).await?;
            if self.kind == EntityKind::Meta {
                self.link_products(id, &row).await?;
            }

            self.deps.progress.advance();
        }

        Ok(())
    }
}
