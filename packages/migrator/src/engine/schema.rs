//! Idempotent DDL.
//!
//! Objects are identified by name only: an add is skipped when a column or
//! index of that name exists, a drop is skipped when it does not. Every
//! method is therefore safe to re-run after a failure half way through.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::db::{ColumnSpec, IndexSpec};
use crate::error::Result;
use crate::kernel::{BaseDatabase, BaseProgress};

pub struct SchemaEditor<'a> {
    db: &'a dyn BaseDatabase,
    progress: &'a dyn BaseProgress,
}

impl<'a> SchemaEditor<'a> {
    pub fn new(db: &'a dyn BaseDatabase, progress: &'a dyn BaseProgress) -> Self {
        Self { db, progress }
    }

    /// Add every column that is not there yet. Returns the number added.
    pub async fn ensure_columns(&self, table: &str, columns: &[ColumnSpec]) -> Result<usize> {
        if columns.is_empty() {
            return Ok(0);
        }

        let existing = self.db.list_columns(table).await?;
        self.progress.text(&format!("Check columns in {}", table));
        self.progress.start(Some(columns.len() as u64));

        let mut added = 0;
        for column in columns {
            if !existing.contains_key(&column.name) {
                debug!(table = %table, column = %column.name, "adding column");
                self.db.add_column(table, column).await?;
                added += 1;
            }
            self.progress.advance();
        }

        self.progress.finish();
        Ok(added)
    }

    /// Add every index whose name is not there yet. Returns the number added.
    pub async fn ensure_indexes(&self, table: &str, indexes: &[IndexSpec]) -> Result<usize> {
        if indexes.is_empty() {
            return Ok(0);
        }

        let existing = self.index_names(table).await?;
        self.progress.text(&format!("Check indexes in {}", table));
        self.progress.start(Some(indexes.len() as u64));

        let mut added = 0;
        for index in indexes {
            if !existing.contains(&index.name) {
                debug!(table = %table, index = %index.name, "adding index");
                self.db.add_index(table, index).await?;
                added += 1;
            }
            self.progress.advance();
        }

        self.progress.finish();
        Ok(added)
    }

    /// Columns first, then indexes over them.
    pub async fn ensure_structure(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        indexes: &[IndexSpec],
    ) -> Result<usize> {
        let columns = self.ensure_columns(table, columns).await?;
        let indexes = self.ensure_indexes(table, indexes).await?;
        Ok(columns + indexes)
    }

    pub async fn drop_columns(&self, table: &str, columns: &[&str]) -> Result<usize> {
        if columns.is_empty() {
            return Ok(0);
        }

        let existing = self.db.list_columns(table).await?;
        self.progress.text(&format!("Drop legacy columns from {}", table));
        self.progress.start(Some(columns.len() as u64));

        let mut dropped = 0;
        for column in columns {
            if existing.contains_key(*column) {
                debug!(table = %table, column = %column, "dropping column");
                self.db.drop_column(table, column).await?;
                dropped += 1;
            }
            self.progress.advance();
        }

        self.progress.finish();
        Ok(dropped)
    }

    pub async fn drop_indexes(&self, table: &str, indexes: &[&str]) -> Result<usize> {
        if indexes.is_empty() {
            return Ok(0);
        }

        let existing = self.index_names(table).await?;
        self.progress.text(&format!("Drop legacy indexes from {}", table));
        self.progress.start(Some(indexes.len() as u64));

        let mut dropped = 0;
        for index in indexes {
            if existing.contains(*index) {
                debug!(table = %table, index = %index, "dropping index");
                self.db.drop_index(table, index).await?;
                dropped += 1;
            }
            self.progress.advance();
        }

        self.progress.finish();
        Ok(dropped)
    }

    /// Indexes before columns: some engines refuse to drop an indexed column.
    pub async fn drop_structure(
        &self,
        table: &str,
        columns: &[&str],
        indexes: &[&str],
    ) -> Result<usize> {
        let indexes = self.drop_indexes(table, indexes).await?;
        let columns = self.drop_columns(table, columns).await?;
        Ok(indexes + columns)
    }

    /// Drop tables that still exist. A failed metadata probe means absent.
    pub async fn drop_tables_if_exist(&self, tables: &[&str]) -> Result<usize> {
        if tables.is_empty() {
            return Ok(0);
        }

        self.progress.text("Drop legacy tables");
        self.progress.start(Some(tables.len() as u64));

        let mut dropped = 0;
        for table in tables {
            let present = match self.db.list_columns(table).await {
                Ok(columns) => !columns.is_empty(),
                Err(e) => {
                    debug!(table = %table, error = %e, "table probe failed, treating as absent");
                    false
                }
            };

            if present {
                info!(table = %table, "dropping legacy table");
                self.db.drop_table(table).await?;
                dropped += 1;
            }
            self.progress.advance();
        }

        self.progress.finish();
        Ok(dropped)
    }

    /// Redefine a column whose live type satisfies `needs_change`.
    /// Missing columns are left alone. Returns whether a statement ran.
    pub async fn modify_column<F>(
        &self,
        table: &str,
        column: &ColumnSpec,
        needs_change: F,
    ) -> Result<bool>
    where
        F: Fn(&str) -> bool + Send,
    {
        let existing = self.db.list_columns(table).await?;
        let current = match existing.get(&column.name) {
            Some(sql_type) => sql_type.to_lowercase(),
            None => return Ok(false),
        };

        if !needs_change(&current) {
            return Ok(false);
        }

        debug!(table = %table, column = %column.name, from = %current, to = %column.sql_type, "modifying column");
        self.db.modify_column(table, column).await?;
        Ok(true)
    }

    async fn index_names(&self, table: &str) -> Result<HashSet<String>> {
        Ok(self
            .db
            .list_indexes(table)
            .await?
            .into_iter()
            .map(|index| index.name)
            .collect())
    }
}
