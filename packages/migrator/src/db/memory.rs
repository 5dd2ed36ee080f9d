//! In-memory storage implementation for testing and development.
//!
//! Behaves like the MySQL backend for everything the engine relies on
//! (name-keyed DDL, keyset pages, loose value comparison) and keeps a journal
//! of every statement that changed something, so tests can assert on DDL and
//! row writes.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use super::{
    coerce_int, row_id, Assignment, ColumnSpec, Filter, IndexInfo, IndexSpec, PageRequest, Row,
    SqlValue, PRIMARY_KEY,
};
use crate::error::{MigrationError, Result};
use crate::kernel::BaseDatabase;

/// A statement recorded by [`MemoryDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    AddColumn { table: String, column: String },
    ModifyColumn { table: String, column: String },
    AddIndex { table: String, index: String },
    DropColumn { table: String, column: String },
    DropIndex { table: String, index: String },
    DropTable { table: String },
    Update { table: String, id: i64 },
    UpdateWhere { table: String, rows: u64 },
    Insert { table: String },
    Disconnect,
}

impl Statement {
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            Self::AddColumn { .. }
                | Self::ModifyColumn { .. }
                | Self::AddIndex { .. }
                | Self::DropColumn { .. }
                | Self::DropIndex { .. }
                | Self::DropTable { .. }
        )
    }

    pub fn is_write(&self) -> bool {
        match self {
            Self::Update { .. } | Self::Insert { .. } => true,
            Self::UpdateWhere { rows, .. } => *rows > 0,
            _ => false,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct MemTable {
    columns: IndexMap<String, String>,
    indexes: Vec<IndexInfo>,
    /// Keyed by insertion rowid; `id`, when the table has one, mirrors it
    rows: BTreeMap<i64, Row>,
    next_rowid: i64,
}

impl MemTable {
    fn check_column(&self, table: &str, column: &str) -> Result<()> {
        if self.columns.contains_key(column) {
            Ok(())
        } else {
            Err(MigrationError::Storage(format!(
                "unknown column `{}` in `{}`",
                column, table
            )))
        }
    }

    fn project(&self, table: &str, row: &Row, columns: &[String]) -> Result<Row> {
        columns
            .iter()
            .map(|column| {
                self.check_column(table, column)?;
                let value = row.get(column).cloned().unwrap_or(SqlValue::Null);
                Ok((column.clone(), value))
            })
            .collect()
    }

    fn matching<'a>(
        &'a self,
        table: &'a str,
        filters: &'a [Filter],
    ) -> impl Iterator<Item = Result<(&'a i64, &'a Row)>> + 'a {
        self.rows.iter().filter_map(move |(rowid, row)| {
            match filters_match(self, table, row, filters) {
                Ok(true) => Some(Ok((rowid, row))),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }
}

#[derive(Debug, Default)]
struct MemState {
    tables: BTreeMap<String, MemTable>,
    journal: Vec<Statement>,
    page_reads: Vec<(String, i64)>,
    failing_updates: HashSet<(String, i64)>,
}

impl MemState {
    fn table(&self, table: &str) -> Result<&MemTable> {
        self.tables
            .get(table)
            .ok_or_else(|| MigrationError::UnknownTable(table.to_string()))
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| MigrationError::UnknownTable(table.to_string()))
    }
}

/// In-memory relational store.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryDatabase {
    state: RwLock<MemState>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemState::default()),
        }
    }

    /// Create (or replace) a table with `(name, type)` columns. Not journaled.
    pub fn create_table(&self, table: &str, columns: &[(&str, &str)]) {
        let columns = columns
            .iter()
            .map(|(name, sql_type)| (name.to_string(), sql_type.to_string()))
            .collect();

        self.state.write().unwrap().tables.insert(
            table.to_string(),
            MemTable {
                columns,
                next_rowid: 1,
                ..MemTable::default()
            },
        );
    }

    /// Add an index to a seeded table. Not journaled.
    pub fn create_index(&self, table: &str, index: &str, columns: &[&str]) {
        let mut state = self.state.write().unwrap();
        if let Some(mem) = state.tables.get_mut(table) {
            for column in columns {
                mem.indexes.push(IndexInfo {
                    name: index.to_string(),
                    column: column.to_string(),
                });
            }
        }
    }

    /// Insert a row without journaling; returns its rowid.
    pub fn seed(&self, table: &str, values: &[(&str, SqlValue)]) -> i64 {
        let row: Row = values
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect();

        let mut state = self.state.write().unwrap();
        match state.tables.get_mut(table) {
            Some(mem) => insert_row(mem, row),
            None => 0,
        }
    }

    /// All rows of a table, ordered by rowid.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .read()
            .unwrap()
            .tables
            .get(table)
            .map(|mem| mem.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Row with the given primary key.
    pub fn row(&self, table: &str, id: i64) -> Option<Row> {
        self.rows(table).into_iter().find(|row| row_id(row) == id)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.read().unwrap().tables.contains_key(table)
    }

    pub fn column_names(&self, table: &str) -> Vec<String> {
        self.state
            .read()
            .unwrap()
            .tables
            .get(table)
            .map(|mem| mem.columns.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn column_type(&self, table: &str, column: &str) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .tables
            .get(table)
            .and_then(|mem| mem.columns.get(column).cloned())
    }

    pub fn index_names(&self, table: &str) -> Vec<String> {
        let state = self.state.read().unwrap();
        let mut names: Vec<String> = state
            .tables
            .get(table)
            .map(|mem| mem.indexes.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default();
        names.dedup();
        names
    }

    /// Statements executed since creation (or the last `clear_journal`).
    pub fn journal(&self) -> Vec<Statement> {
        self.state.read().unwrap().journal.clone()
    }

    pub fn clear_journal(&self) {
        let mut state = self.state.write().unwrap();
        state.journal.clear();
        state.page_reads.clear();
    }

    pub fn ddl_count(&self) -> usize {
        self.journal().iter().filter(|s| s.is_ddl()).count()
    }

    pub fn write_count(&self) -> usize {
        self.journal().iter().filter(|s| s.is_write()).count()
    }

    /// Primary keys written by `update_by_id` on `table`, in order.
    pub fn updated_ids(&self, table: &str) -> Vec<i64> {
        self.journal()
            .into_iter()
            .filter_map(|statement| match statement {
                Statement::Update { table: t, id } if t == table => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn disconnect_count(&self) -> usize {
        self.journal()
            .iter()
            .filter(|s| matches!(s, Statement::Disconnect))
            .count()
    }

    /// `(table, after)` of every page fetched.
    pub fn page_reads(&self) -> Vec<(String, i64)> {
        self.state.read().unwrap().page_reads.clone()
    }

    /// Make `update_by_id` on this row fail until cleared.
    pub fn fail_updates_for(&self, table: &str, id: i64) {
        self.state
            .write()
            .unwrap()
            .failing_updates
            .insert((table.to_string(), id));
    }

    pub fn clear_failures(&self) {
        self.state.write().unwrap().failing_updates.clear();
    }

    fn record(&self, statement: Statement) {
        self.state.write().unwrap().journal.push(statement);
    }
}

fn insert_row(mem: &mut MemTable, mut row: Row) -> i64 {
    let rowid = match row.get(PRIMARY_KEY).map(SqlValue::as_int) {
        Some(id) if id > 0 => id,
        _ => mem.next_rowid,
    };

    if mem.columns.contains_key(PRIMARY_KEY) {
        row.insert(PRIMARY_KEY.to_string(), SqlValue::Int(rowid));
    }
    for column in mem.columns.keys() {
        if !row.contains_key(column) {
            row.insert(column.clone(), SqlValue::Null);
        }
    }

    mem.next_rowid = mem.next_rowid.max(rowid + 1);
    mem.rows.insert(rowid, row);
    rowid
}

/// Default literal -> stored value.
fn parse_default(literal: Option<&str>) -> SqlValue {
    match literal.map(str::trim) {
        None => SqlValue::Null,
        Some(text) if text.eq_ignore_ascii_case("null") => SqlValue::Null,
        Some(text) if text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2 => {
            SqlValue::Text(text[1..text.len() - 1].to_string())
        }
        Some(text) if text.parse::<i64>().is_ok() => SqlValue::Int(coerce_int(text)),
        Some(text) => SqlValue::Text(text.to_string()),
    }
}

fn filters_match(mem: &MemTable, table: &str, row: &Row, filters: &[Filter]) -> Result<bool> {
    for filter in filters {
        let (column, matched) = match filter {
            Filter::Eq(column, value) => (column, cell(row, column).same_as(value)),
            Filter::NotEq(column, value) => {
                let cell = cell(row, column);
                // SQL semantics: NULL never compares
                (column, cell != SqlValue::Null && !cell.same_as(value))
            }
            Filter::In(column, values) => {
                let cell = cell(row, column);
                (column, values.iter().any(|value| cell.same_as(value)))
            }
            Filter::Like(column, pattern) => {
                let cell = cell(row, column);
                let matched = cell != SqlValue::Null && like(&cell.as_text(), pattern);
                (column, matched)
            }
        };

        mem.check_column(table, column)?;
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn cell(row: &Row, column: &str) -> SqlValue {
    row.get(column).cloned().unwrap_or(SqlValue::Null)
}

/// SQL `LIKE` (case-sensitive, no escape character).
fn like(text: &str, pattern: &str) -> bool {
    fn matches(text: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => (0..=text.len()).any(|skip| matches(&text[skip..], rest)),
            Some(('_', rest)) => !text.is_empty() && matches(&text[1..], rest),
            Some((c, rest)) => text.first() == Some(c) && matches(&text[1..], rest),
        }
    }

    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    matches(&text, &pattern)
}

#[async_trait]
impl BaseDatabase for MemoryDatabase {
    async fn list_columns(&self, table: &str) -> Result<IndexMap<String, String>> {
        Ok(self.state.read().unwrap().table(table)?.columns.clone())
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        Ok(self.state.read().unwrap().table(table)?.indexes.clone())
    }

    async fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let mem = state.table_mut(table)?;
            if mem.columns.contains_key(&column.name) {
                return Err(MigrationError::Schema {
                    table: table.to_string(),
                    object: column.name.clone(),
                    reason: "duplicate column name".to_string(),
                });
            }

            mem.columns
                .insert(column.name.clone(), column.sql_type.to_lowercase());
            let default = parse_default(column.default.as_deref());
            for row in mem.rows.values_mut() {
                row.insert(column.name.clone(), default.clone());
            }
        }

        self.record(Statement::AddColumn {
            table: table.to_string(),
            column: column.name.clone(),
        });
        Ok(())
    }

    async fn modify_column(&self, table: &str, column: &ColumnSpec) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let mem = state.table_mut(table)?;
            match mem.columns.get_mut(&column.name) {
                Some(sql_type) => *sql_type = column.sql_type.to_lowercase(),
                None => {
                    return Err(MigrationError::Schema {
                        table: table.to_string(),
                        object: column.name.clone(),
                        reason: "unknown column".to_string(),
                    })
                }
            }
        }

        self.record(Statement::ModifyColumn {
            table: table.to_string(),
            column: column.name.clone(),
        });
        Ok(())
    }

    async fn add_index(&self, table: &str, index: &IndexSpec) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let mem = state.table_mut(table)?;
            if mem.indexes.iter().any(|i| i.name == index.name) {
                return Err(MigrationError::Schema {
                    table: table.to_string(),
                    object: index.name.clone(),
                    reason: "duplicate key name".to_string(),
                });
            }
            for (column, _) in &index.columns {
                mem.check_column(table, column)?;
            }
            for (column, _) in &index.columns {
                mem.indexes.push(IndexInfo {
                    name: index.name.clone(),
                    column: column.clone(),
                });
            }
        }

        self.record(Statement::AddIndex {
            table: table.to_string(),
            index: index.name.clone(),
        });
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let mem = state.table_mut(table)?;
            if mem.columns.shift_remove(column).is_none() {
                return Err(MigrationError::Schema {
                    table: table.to_string(),
                    object: column.to_string(),
                    reason: "can't drop; check that column exists".to_string(),
                });
            }
            // MySQL drops the column from every index that used it
            mem.indexes.retain(|i| i.column != column);
            for row in mem.rows.values_mut() {
                row.shift_remove(column);
            }
        }

        self.record(Statement::DropColumn {
            table: table.to_string(),
            column: column.to_string(),
        });
        Ok(())
    }

    async fn drop_index(&self, table: &str, index: &str) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let mem = state.table_mut(table)?;
            let before = mem.indexes.len();
            mem.indexes.retain(|i| i.name != index);
            if mem.indexes.len() == before {
                return Err(MigrationError::Schema {
                    table: table.to_string(),
                    object: index.to_string(),
                    reason: "can't drop; check that key exists".to_string(),
                });
            }
        }

        self.record(Statement::DropIndex {
            table: table.to_string(),
            index: index.to_string(),
        });
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let removed = self.state.write().unwrap().tables.remove(table).is_some();
        if removed {
            self.record(Statement::DropTable {
                table: table.to_string(),
            });
        }
        Ok(())
    }

    async fn count_rows(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let state = self.state.read().unwrap();
        let mem = state.table(table)?;
        let mut count = 0;
        for item in mem.matching(table, filters) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<Row>> {
        let mut state = self.state.write().unwrap();
        state
            .page_reads
            .push((request.table.to_string(), request.after));

        let mem = state.table(request.table)?;
        mem.check_column(request.table, PRIMARY_KEY)?;

        let mut candidates = Vec::new();
        for item in mem.matching(request.table, request.filters) {
            let (_, row) = item?;
            let id = row_id(row);
            if id > request.after {
                candidates.push((id, row));
            }
        }
        candidates.sort_by_key(|(id, _)| *id);

        candidates
            .into_iter()
            .take(request.limit as usize)
            .map(|(_, row)| mem.project(request.table, row, request.columns))
            .collect()
    }

    async fn fetch_one(
        &self,
        table: &str,
        columns: &[String],
        filters: &[Filter],
    ) -> Result<Option<Row>> {
        let state = self.state.read().unwrap();
        let mem = state.table(table)?;
        let found = match mem.matching(table, filters).next() {
            Some(item) => {
                let (_, row) = item?;
                Some(mem.project(table, row, columns)?)
            }
            None => None,
        };
        Ok(found)
    }

    async fn next_primary_keys(&self, table: &str, after: i64, limit: u32) -> Result<Vec<i64>> {
        let state = self.state.read().unwrap();
        let mem = state.table(table)?;
        mem.check_column(table, PRIMARY_KEY)?;

        let mut ids: Vec<i64> = mem
            .rows
            .values()
            .map(row_id)
            .filter(|id| *id > after)
            .collect();
        ids.sort_unstable();
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn select_ints(
        &self,
        table: &str,
        column: &str,
        filters: &[Filter],
    ) -> Result<Vec<i64>> {
        let state = self.state.read().unwrap();
        let mem = state.table(table)?;
        mem.check_column(table, column)?;

        let mut values = Vec::new();
        for item in mem.matching(table, filters) {
            let (_, row) = item?;
            values.push(cell(row, column).as_int());
        }
        Ok(values)
    }

    async fn exists(&self, table: &str, filters: &[Filter]) -> Result<bool> {
        let state = self.state.read().unwrap();
        let mem = state.table(table)?;
        let found = match mem.matching(table, filters).next() {
            Some(item) => item.map(|_| true),
            None => Ok(false),
        };
        found
    }

    async fn update_by_id(&self, table: &str, id: i64, values: &Row) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        {
            let mut state = self.state.write().unwrap();
            if state.failing_updates.contains(&(table.to_string(), id)) {
                return Err(MigrationError::Storage(format!(
                    "injected failure updating `{}` row {}",
                    table, id
                )));
            }

            let mem = state.table_mut(table)?;
            for column in values.keys() {
                mem.check_column(table, column)?;
            }
            if let Some(row) = mem.rows.values_mut().find(|row| row_id(row) == id) {
                for (column, value) in values {
                    row.insert(column.clone(), value.clone());
                }
            }
        }

        self.record(Statement::Update {
            table: table.to_string(),
            id,
        });
        Ok(())
    }

    async fn update_where(
        &self,
        table: &str,
        assignments: &[Assignment],
        filters: &[Filter],
    ) -> Result<u64> {
        let affected = {
            let mut state = self.state.write().unwrap();
            let mem = state.table_mut(table)?;
            for assignment in assignments {
                match assignment {
                    Assignment::Value(column, _) => mem.check_column(table, column)?,
                    Assignment::Column(column, source) => {
                        mem.check_column(table, column)?;
                        mem.check_column(table, source)?;
                    }
                }
            }

            let mut targets = Vec::new();
            for item in mem.matching(table, filters) {
                let (rowid, _) = item?;
                targets.push(*rowid);
            }

            let mut affected = 0;
            for rowid in targets {
                if let Some(row) = mem.rows.get_mut(&rowid) {
                    let mut changed = false;
                    for assignment in assignments {
                        let (column, value) = match assignment {
                            Assignment::Value(column, value) => (column, value.clone()),
                            Assignment::Column(column, source) => (column, cell(row, source)),
                        };
                        if cell(row, column) != value {
                            row.insert(column.clone(), value);
                            changed = true;
                        }
                    }
                    if changed {
                        affected += 1;
                    }
                }
            }
            affected
        };

        self.record(Statement::UpdateWhere {
            table: table.to_string(),
            rows: affected,
        });
        Ok(affected)
    }

    async fn insert(&self, table: &str, values: &Row) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let mem = state.table_mut(table)?;
            for column in values.keys() {
                mem.check_column(table, column)?;
            }
            insert_row(mem, values.clone());
        }

        self.record(Statement::Insert {
            table: table.to_string(),
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.record(Statement::Disconnect);
        Ok(())
    }
}
