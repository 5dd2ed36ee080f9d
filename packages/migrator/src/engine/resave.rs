//! Re-saves every entity of a kind through the admin model so that computed
//! fields and route caches are rebuilt by business logic.

use serde_json::Value;
use tracing::{debug, info};

use super::runner::StepSummary;
use super::scanner::ScanCursor;
use crate::db::coerce_int;
use crate::entity::EntityKind;
use crate::error::{MigrationError, Result};
use crate::kernel::{Entity, MigrationDeps, SaveOutcome};

pub struct ResaveDriver<'a> {
    deps: &'a MigrationDeps,
}

/// Primary key of a loaded entity (`0` when missing or not numeric).
fn entity_id(entity: &Entity) -> i64 {
    match entity.get("id") {
        Some(Value::Number(number)) => number.as_i64().unwrap_or(0),
        Some(Value::String(text)) => coerce_int(text),
        _ => 0,
    }
}

impl<'a> ResaveDriver<'a> {
    pub fn new(deps: &'a MigrationDeps) -> Self {
        Self { deps }
    }

    pub async fn resave_all(&self, kind: EntityKind) -> Result<StepSummary> {
        let domain = self.deps.domain_model()?;
        let db = self.deps.db.as_ref();
        let progress = self.deps.progress.as_ref();
        let releaser = self.deps.releaser();
        let table = kind.table();

        domain
            .assume_system_identity()
            .await
            .map_err(MigrationError::Domain)?;

        let total = db.count_rows(table, &[]).await?;
        progress.text(&format!("Resave {}", kind.plural_label()));
        progress.start(Some(total));

        let mut summary = StepSummary::default();
        let mut cursor = ScanCursor::start(self.deps.page_size);

        while !cursor.exhausted {
            let ids = db
                .next_primary_keys(table, cursor.last_seen, cursor.page_size)
                .await?;
            if ids.is_empty() {
                break;
            }
            cursor.check_page(table, &ids)?;

            for &id in &ids {
                summary.rows_scanned += 1;

                let entity = match domain.load(kind, id).await.map_err(MigrationError::Domain)? {
                    Some(entity) if entity_id(&entity) != 0 => entity,
                    _ => {
                        debug!(kind = %kind, id, "nothing to resave");
                        summary.rows_skipped += 1;
                        continue;
                    }
                };

                match domain
                    .save(kind, entity)
                    .await
                    .map_err(MigrationError::Domain)?
                {
                    SaveOutcome::Saved => {
                        summary.rows_updated += 1;
                        progress.advance();
                    }
                    SaveOutcome::Rejected(messages) => {
                        progress.finish();
                        return Err(MigrationError::Save { kind, id, messages });
                    }
                }
            }

            releaser.release().await?;
            cursor = cursor.advance(table, &ids)?;
        }

        progress.finish();
        info!(kind = %kind, saved = summary.rows_updated, skipped = summary.rows_skipped, "resave finished");
        Ok(summary)
    }
}
