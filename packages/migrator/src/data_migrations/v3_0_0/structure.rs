//! Structure-only steps: alpha indexes, user columns, categories and fields.

use async_trait::async_trait;
use tracing::info;

use super::transforms::consolidate_totals;
use crate::db::{row_id, Assignment, ColumnSpec, IndexSpec, Row, SortOrder, SqlValue};
use crate::engine::{detect_backfill_columns, MigrationStep, PageVisitor, StepSummary};
use crate::entity::{
    CATEGORIES_ITEMS_TABLE, CATEGORIES_TABLE, FIELDS_TABLE, METAS_TABLE, ORDERS_TABLE,
    PRODUCTS_TABLE,
};
use crate::error::Result;
use crate::kernel::MigrationDeps;

// =============================================================================
// Alpha structures
// =============================================================================

/// Ordering indexes introduced during the 3.0 alpha cycle.
pub struct AlphaStructuresStep;

#[async_trait]
impl MigrationStep for AlphaStructuresStep {
    fn name(&self) -> &'static str {
        "update_alpha_structures"
    }

    fn title(&self) -> &'static str {
        "Update for Alpha versions"
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        let indexes = [
            IndexSpec::ordered(
                "idx_category_ordering_asc",
                &[("category_id", SortOrder::Asc), ("ordering", SortOrder::Asc)],
            ),
            IndexSpec::ordered(
                "idx_category_ordering_desc",
                &[("category_id", SortOrder::Asc), ("ordering", SortOrder::Desc)],
            ),
        ];

        let added = deps
            .schema()
            .ensure_indexes(CATEGORIES_ITEMS_TABLE, &indexes)
            .await?;
        Ok(StepSummary::default().with_ddl(added).settle())
    }
}

// =============================================================================
// Users columns
// =============================================================================

/// `created_by` / `modified_by` lose `unsigned`; `idx_createdby` is renamed.
pub struct UsersColumnsStep;

#[async_trait]
impl MigrationStep for UsersColumnsStep {
    fn name(&self) -> &'static str {
        "update_users_columns"
    }

    fn title(&self) -> &'static str {
        "Update users columns"
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        let schema = deps.schema();
        let mut ddl = 0;

        for table in [PRODUCTS_TABLE, METAS_TABLE, ORDERS_TABLE] {
            deps.progress.text(&format!("Update `{}` table", table));

            deps.progress.start(Some(2));
            for column in ["created_by", "modified_by"] {
                let target = ColumnSpec::new(column, "int(10)").not_null().default("0");
                if schema
                    .modify_column(table, &target, |sql_type| sql_type.contains("unsigned"))
                    .await?
                {
                    ddl += 1;
                }
                deps.progress.advance();
            }
            deps.progress.finish();

            ddl += schema.drop_indexes(table, &["idx_createdby"]).await?;
            if deps.db.list_columns(table).await?.contains_key("created_by") {
                ddl += schema
                    .ensure_indexes(table, &[IndexSpec::new("idx_created_by", &["created_by"])])
                    .await?;
            }
        }

        deps.releaser().release().await?;
        Ok(StepSummary::default().with_ddl(ddl).settle())
    }
}

// =============================================================================
// Categories
// =============================================================================

const CATEGORIES_LEGACY: &[&str] = &["total_products", "total_metas"];

pub struct CategoriesStructureStep;

#[async_trait]
impl MigrationStep for CategoriesStructureStep {
    fn name(&self) -> &'static str {
        "update_categories_structure"
    }

    fn title(&self) -> &'static str {
        "Update categories structure"
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        let schema = deps.schema();
        let mut summary = StepSummary::default();

        deps.progress.text("Check columns types");
        let fields = ColumnSpec::new("fields", "text");
        if schema
            .modify_column(CATEGORIES_TABLE, &fields, |sql_type| sql_type != "text")
            .await?
        {
            summary.ddl_statements += 1;
            deps.releaser().release().await?;
        }

        summary.ddl_statements += schema
            .ensure_columns(
                CATEGORIES_TABLE,
                &[ColumnSpec::new("totals", "json").after("fields")],
            )
            .await? as u64;

        deps.progress.text("Get total items");
        let total = deps.db.count_rows(CATEGORIES_TABLE, &[]).await?;
        if total == 0 {
            deps.progress.note("Categories not found");
        }

        if let Some(selection) =
            detect_backfill_columns(deps.db.as_ref(), CATEGORIES_TABLE, CATEGORIES_LEGACY, &["id", "totals"])
                .await?
        {
            deps.progress.text("Paste data to new columns");
            deps.progress.start(Some(total));

            let mut backfill = TotalsBackfill {
                deps,
                summary: StepSummary::default(),
            };
            deps.scanner()
                .scan(CATEGORIES_TABLE, selection.columns(), &[], &mut backfill)
                .await?;
            deps.progress.finish();
            summary.merge(backfill.summary);

            summary.ddl_statements += schema
                .drop_structure(
                    CATEGORIES_TABLE,
                    CATEGORIES_LEGACY,
                    &["idx_total_products", "idx_total_metas"],
                )
                .await? as u64;
        }

        let summary = summary.settle();
        if summary.already_current {
            deps.progress.note("Categories structure is correct");
        }
        Ok(summary)
    }
}

struct TotalsBackfill<'a> {
    deps: &'a MigrationDeps,
    summary: StepSummary,
}

#[async_trait]
impl PageVisitor for TotalsBackfill<'_> {
    async fn visit_page(&mut self, rows: Vec<Row>) -> Result<()> {
        for row in rows {
            self.summary.rows_scanned += 1;

            if let Some(totals) = consolidate_totals(CATEGORIES_TABLE, &row)? {
                let mut patch = Row::new();
                patch.insert("totals".into(), SqlValue::Text(totals.to_blob()));
                self.deps
                    .db
                    .update_by_id(CATEGORIES_TABLE, row_id(&row), &patch)
                    .await?;
                self.summary.rows_updated += 1;
            }

            self.deps.progress.advance();
        }
        Ok(())
    }
}

// =============================================================================
// Fields
// =============================================================================

/// Split the single `fieldset` into administrator and site fieldsets.
pub struct FieldsStructureStep;

#[async_trait]
impl MigrationStep for FieldsStructureStep {
    fn name(&self) -> &'static str {
        "update_fields_structure"
    }

    fn title(&self) -> &'static str {
        "Update fields structure"
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        deps.progress.text("Get columns");
        let columns = deps.db.list_columns(FIELDS_TABLE).await?;
        if !columns.contains_key("fieldset") {
            deps.progress.note("Fields structure is correct");
            return Ok(StepSummary::current());
        }

        let schema = deps.schema();
        let mut summary = StepSummary::default().with_ddl(
            schema
                .ensure_structure(
                    FIELDS_TABLE,
                    &[
                        ColumnSpec::new("fieldset_administrator", "int(11) unsigned")
                            .not_null()
                            .default("0")
                            .after("plugin"),
                        ColumnSpec::new("fieldset_site", "int(11) unsigned")
                            .not_null()
                            .default("0")
                            .after("fieldset_administrator"),
                    ],
                    &[
                        IndexSpec::new("idx_fieldset_administrator", &["fieldset_administrator"]),
                        IndexSpec::new("idx_fieldset_site", &["fieldset_site"]),
                    ],
                )
                .await?,
        );

        deps.progress.text("Update data");
        let copied = deps
            .db
            .update_where(
                FIELDS_TABLE,
                &[
                    Assignment::Column("fieldset_site".into(), "fieldset".into()),
                    Assignment::Column("fieldset_administrator".into(), "fieldset".into()),
                ],
                &[],
            )
            .await?;
        summary.rows_updated += copied;
        info!(rows = copied, "fieldsets copied");

        summary.ddl_statements += schema
            .drop_structure(FIELDS_TABLE, &["fieldset"], &["idx_fieldset"])
            .await? as u64;

        deps.releaser().release().await?;
        Ok(summary.settle())
    }
}
