//! Legacy categories menu items become category views.

use async_trait::async_trait;

use super::transforms::{menu_params, parse_blob, rewrite_menu_link};
use crate::db::{row_id, Filter, Row, SqlValue};
use crate::engine::{MigrationStep, PageVisitor, StepSummary};
use crate::entity::MENU_TABLE;
use crate::error::Result;
use crate::kernel::MigrationDeps;

fn legacy_items(component: &str) -> Vec<Filter> {
    vec![
        Filter::Eq("type".into(), SqlValue::from("component")),
        Filter::Like("link".into(), format!("%option={}%", component)),
        Filter::Like("link".into(), "%view=categories%".into()),
    ]
}

pub struct MenuItemsStep;

#[async_trait]
impl MigrationStep for MenuItemsStep {
    fn name(&self) -> &'static str {
        "update_menu_items"
    }

    fn title(&self) -> &'static str {
        "Update menu products items"
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        let filters = legacy_items(&deps.component);

        deps.progress.text("Get total items");
        let total = deps.db.count_rows(MENU_TABLE, &filters).await?;
        if total == 0 {
            deps.progress.note("Legacy menu items not found");
            return Ok(StepSummary::current());
        }

        deps.progress.text("Change views");
        deps.progress.start(Some(total));
        let columns = ["id".to_string(), "link".to_string(), "params".to_string()];
        let mut rewrite = MenuRewrite {
            deps,
            summary: StepSummary::default(),
        };
        deps.scanner()
            .scan(MENU_TABLE, &columns, &filters, &mut rewrite)
            .await?;
        deps.progress.finish();

        Ok(rewrite.summary.settle())
    }
}

struct MenuRewrite<'a> {
    deps: &'a MigrationDeps,
    summary: StepSummary,
}

#[async_trait]
impl PageVisitor for MenuRewrite<'_> {
    async fn visit_page(&mut self, rows: Vec<Row>) -> Result<()> {
        for row in rows {
            self.summary.rows_scanned += 1;

            let link = row.get("link").map(SqlValue::as_text).unwrap_or_default();
            let (link, layout) = rewrite_menu_link(&link);
            let mut params = parse_blob(MENU_TABLE, &row, "params")?;
            menu_params(&mut params, &layout);

            let mut patch = Row::new();
            patch.insert("link".into(), SqlValue::Text(link));
            patch.insert("params".into(), SqlValue::Text(params.to_blob()));
            self.deps
                .db
                .update_by_id(MENU_TABLE, row_id(&row), &patch)
                .await?;
            self.summary.rows_updated += 1;

            self.deps.progress.advance();
        }
        Ok(())
    }
}
