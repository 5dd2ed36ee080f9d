//! Detects which legacy ("rudimentary") columns are still present and builds
//! the select list for a backfill scan.

use crate::error::Result;
use crate::kernel::BaseDatabase;

/// Select list of a backfill: the base columns followed by the legacy
/// columns that survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    columns: Vec<String>,
    base_len: usize,
}

impl Selection {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Legacy columns carried by the scan
    pub fn legacy(&self) -> &[String] {
        &self.columns[self.base_len..]
    }

    /// Whether the scan carries this legacy column.
    pub fn contains(&self, column: &str) -> bool {
        self.legacy().iter().any(|c| c == column)
    }
}

/// `None` when no candidate survived and no backfill is needed.
pub async fn detect_backfill_columns(
    db: &dyn BaseDatabase,
    table: &str,
    candidates: &[&str],
    base: &[&str],
) -> Result<Option<Selection>> {
    let live = db.list_columns(table).await?;

    let surviving: Vec<String> = candidates
        .iter()
        .filter(|candidate| live.contains_key(**candidate))
        .map(|candidate| candidate.to_string())
        .collect();

    if surviving.is_empty() {
        return Ok(None);
    }

    let mut columns: Vec<String> = base.iter().map(|c| c.to_string()).collect();
    let base_len = columns.len();
    columns.extend(surviving);

    Ok(Some(Selection { columns, base_len }))
}
