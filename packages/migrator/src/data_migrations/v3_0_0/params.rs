//! Component params renamed in 3.0.0.

use async_trait::async_trait;
use tracing::info;

use super::transforms::parse_blob;
use crate::db::{Assignment, Filter, SqlValue};
use crate::engine::{MigrationStep, StepSummary};
use crate::entity::EXTENSIONS_TABLE;
use crate::error::Result;
use crate::kernel::MigrationDeps;

/// Legacy key -> 3.0.0 key. `privancy_client` is the name the component reads.
pub const PARAMS_MAPPING: &[(&str, &str)] = &[
    ("user_login_code", "login_code"),
    ("user_login_timeout", "login_code_timeout"),
    ("user_login_length", "login_code_length"),
    ("user_login_symbols", "login_code_symbols"),
    ("user_ip", "privacy_ip"),
    ("user_client", "privancy_client"),
    ("user_menu", "user_menu_additional"),
];

pub struct ComponentParamsStep;

#[async_trait]
impl MigrationStep for ComponentParamsStep {
    fn name(&self) -> &'static str {
        "update_component_params"
    }

    fn title(&self) -> &'static str {
        "Update RadicalMart Params"
    }

    async fn run(&self, deps: &MigrationDeps) -> Result<StepSummary> {
        deps.progress.text("Get current params");
        let columns = ["extension_id".to_string(), "params".to_string()];
        let extension = deps
            .db
            .fetch_one(
                EXTENSIONS_TABLE,
                &columns,
                &[Filter::Eq(
                    "element".into(),
                    SqlValue::from(deps.component.as_str()),
                )],
            )
            .await?;

        let extension = match extension {
            Some(extension) => extension,
            None => {
                deps.progress
                    .note(&format!("Extension {} not found", deps.component));
                return Ok(StepSummary::current());
            }
        };
        let extension_id = extension
            .get("extension_id")
            .map(SqlValue::as_int)
            .unwrap_or(0);

        deps.progress.text("Move params");
        let mut params = parse_blob(EXTENSIONS_TABLE, &extension, "params")?;
        deps.progress.start(Some(PARAMS_MAPPING.len() as u64));
        let moved = params.move_keys(PARAMS_MAPPING);
        for _ in PARAMS_MAPPING {
            deps.progress.advance();
        }
        deps.progress.finish();

        if moved == 0 {
            deps.progress.note("Params are up to date");
            return Ok(StepSummary::current());
        }

        deps.progress.text("Save updated params");
        let updated = deps
            .db
            .update_where(
                EXTENSIONS_TABLE,
                &[Assignment::Value(
                    "params".into(),
                    SqlValue::Text(params.to_blob()),
                )],
                &[Filter::Eq("extension_id".into(), SqlValue::Int(extension_id))],
            )
            .await?;
        deps.releaser().release().await?;
        info!(extension_id, moved, "component params renamed");

        Ok(StepSummary {
            rows_scanned: 1,
            rows_updated: updated,
            ..StepSummary::default()
        }
        .settle())
    }
}
