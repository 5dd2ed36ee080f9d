//! Keyset pagination over a table's primary key.
//!
//! Each page is `id > last_seen ORDER BY id ASC LIMIT page_size`. The cursor
//! only moves once the visitor has finished the page and resources were
//! released, so an interrupted scan repeats at most one page.

use async_trait::async_trait;
use tracing::debug;

use super::release::ResourceReleaser;
use crate::db::{row_id, Filter, PageRequest, Row};
use crate::error::{MigrationError, Result};
use crate::kernel::BaseDatabase;

/// Rows per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Position of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub last_seen: i64,
    pub page_size: u32,
    pub exhausted: bool,
}

impl ScanCursor {
    pub fn start(page_size: u32) -> Self {
        Self {
            last_seen: 0,
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    /// Fails when `ids` is not strictly ascending past `last_seen`.
    pub fn check_page(&self, table: &str, ids: &[i64]) -> Result<()> {
        let mut previous = self.last_seen;
        for &next in ids {
            if next <= previous {
                return Err(MigrationError::CursorOrder {
                    table: table.to_string(),
                    previous,
                    next,
                });
            }
            previous = next;
        }
        Ok(())
    }

    /// Cursor after a fully processed page.
    pub fn advance(self, table: &str, ids: &[i64]) -> Result<Self> {
        self.check_page(table, ids)?;

        Ok(Self {
            last_seen: ids.last().copied().unwrap_or(self.last_seen),
            page_size: self.page_size,
            exhausted: (ids.len() as u64) < u64::from(self.page_size),
        })
    }
}

/// Receives each page of a scan.
#[async_trait]
pub trait PageVisitor: Send {
    async fn visit_page(&mut self, rows: Vec<Row>) -> Result<()>;
}

pub struct CursorScanner<'a> {
    db: &'a dyn BaseDatabase,
    releaser: ResourceReleaser<'a>,
    page_size: u32,
}

impl<'a> CursorScanner<'a> {
    pub fn new(db: &'a dyn BaseDatabase, releaser: ResourceReleaser<'a>, page_size: u32) -> Self {
        Self {
            db,
            releaser,
            page_size: page_size.max(1),
        }
    }

    /// Stream every matching row of `table` through `visitor`, page by page.
    /// Returns the final cursor.
    pub async fn scan<V>(
        &self,
        table: &str,
        columns: &[String],
        filters: &[Filter],
        visitor: &mut V,
    ) -> Result<ScanCursor>
    where
        V: PageVisitor + ?Sized,
    {
        let mut cursor = ScanCursor::start(self.page_size);

        while !cursor.exhausted {
            let rows = self
                .db
                .fetch_page(&PageRequest {
                    table,
                    columns,
                    filters,
                    after: cursor.last_seen,
                    limit: cursor.page_size,
                })
                .await?;

            if rows.is_empty() {
                cursor.exhausted = true;
                break;
            }

            let ids: Vec<i64> = rows.iter().map(row_id).collect();
            cursor.check_page(table, &ids)?;
            debug!(table = %table, after = cursor.last_seen, rows = ids.len(), "page fetched");

            visitor.visit_page(rows).await?;
            self.releaser.release().await?;

            cursor = cursor.advance(table, &ids)?;
        }

        Ok(cursor)
    }
}
