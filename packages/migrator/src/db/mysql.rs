//! MySQL storage implementation.
//!
//! The production backend behind the catalog. Metadata comes from
//! `information_schema`, statements are built with [`QueryBuilder`] and
//! every value crosses the wire as text (ids as signed integers), which is
//! what the legacy columns hold anyway.

use async_trait::async_trait;
use indexmap::IndexMap;
use sqlx::mysql::{MySql, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Executor, QueryBuilder, Row as _};
use std::sync::RwLock;
use tracing::debug;

use super::{
    Assignment, ColumnSpec, Filter, IndexInfo, IndexSpec, PageRequest, Row, SqlValue, PRIMARY_KEY,
};
use crate::error::{MigrationError, Result};
use crate::kernel::BaseDatabase;

const PREFIX_PLACEHOLDER: &str = "#__";

/// MySQL-backed catalog store.
pub struct MySqlDatabase {
    url: String,
    prefix: String,
    pool: RwLock<MySqlPool>,
}

impl MySqlDatabase {
    /// Connect to the catalog database.
    ///
    /// `prefix` replaces the `#__` placeholder in table names (`jos_`).
    pub async fn connect(database_url: &str, prefix: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self {
            url: database_url.to_string(),
            prefix: prefix.to_string(),
            pool: RwLock::new(pool),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn pool(&self) -> MySqlPool {
        self.pool.read().unwrap().clone()
    }

    /// Physical table name.
    fn resolve(&self, table: &str) -> String {
        table.replace(PREFIX_PLACEHOLDER, &self.prefix)
    }

    async fn ddl(&self, table: &str, object: &str, sql: String) -> Result<()> {
        debug!(sql = %sql, "executing DDL");
        let pool = self.pool();
        (&pool)
            .execute(sql.as_str())
            .await
            .map_err(|e| MigrationError::Schema {
                table: table.to_string(),
                object: object.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn column_definition(column: &ColumnSpec) -> String {
    let mut sql = format!("{} {}", quote(&column.name), column.sql_type);
    sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    if let Some(after) = &column.after {
        sql.push_str(" AFTER ");
        sql.push_str(&quote(after));
    }
    sql
}

/// Select list expression; ids are read as integers, everything else as text.
fn select_expression(column: &str) -> String {
    if column == PRIMARY_KEY {
        format!("CAST({0} AS SIGNED) AS {0}", quote(column))
    } else {
        format!("CAST({0} AS CHAR) AS {0}", quote(column))
    }
}

fn push_value(builder: &mut QueryBuilder<'_, MySql>, value: &SqlValue) {
    match value {
        SqlValue::Null => {
            builder.push("NULL");
        }
        SqlValue::Int(value) => {
            builder.push_bind(*value);
        }
        SqlValue::Text(text) => {
            builder.push_bind(text.clone());
        }
    }
}

/// Appends ` WHERE ...` (or ` AND ...` when `has_where`).
fn push_filters(builder: &mut QueryBuilder<'_, MySql>, filters: &[Filter], has_where: bool) {
    for (index, filter) in filters.iter().enumerate() {
        builder.push(if index == 0 && !has_where {
            " WHERE "
        } else {
            " AND "
        });

        match filter {
            Filter::Eq(column, SqlValue::Null) => {
                builder.push(quote(column)).push(" IS NULL");
            }
            Filter::Eq(column, value) => {
                builder.push(quote(column)).push(" = ");
                push_value(builder, value);
            }
            Filter::NotEq(column, SqlValue::Null) => {
                builder.push(quote(column)).push(" IS NOT NULL");
            }
            Filter::NotEq(column, value) => {
                builder.push(quote(column)).push(" <> ");
                push_value(builder, value);
            }
            Filter::In(_, values) if values.is_empty() => {
                builder.push("1 = 0");
            }
            Filter::In(column, values) => {
                builder.push(quote(column)).push(" IN (");
                for (position, value) in values.iter().enumerate() {
                    if position > 0 {
                        builder.push(", ");
                    }
                    push_value(builder, value);
                }
                builder.push(")");
            }
            Filter::Like(column, pattern) => {
                builder.push(quote(column)).push(" LIKE ");
                builder.push_bind(pattern.clone());
            }
        }
    }
}

fn read_row(row: &MySqlRow, columns: &[String]) -> Result<Row> {
    let mut values = Row::new();
    for (index, column) in columns.iter().enumerate() {
        let value = if column == PRIMARY_KEY {
            row.try_get::<Option<i64>, _>(index)?
                .map(SqlValue::Int)
                .unwrap_or(SqlValue::Null)
        } else {
            SqlValue::from(row.try_get::<Option<String>, _>(index)?)
        };
        values.insert(column.clone(), value);
    }
    Ok(values)
}

impl MySqlDatabase {
    fn select<'a>(&self, table: &str, columns: &[String]) -> QueryBuilder<'a, MySql> {
        let list: Vec<String> = columns.iter().map(|c| select_expression(c)).collect();
        QueryBuilder::new(format!(
            "SELECT {} FROM {}",
            list.join(", "),
            quote(&self.resolve(table))
        ))
    }
}

#[async_trait]
impl BaseDatabase for MySqlDatabase {
    async fn list_columns(&self, table: &str) -> Result<IndexMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR)
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
            "#,
        )
        .bind(self.resolve(table))
        .fetch_all(&self.pool())
        .await?;

        if rows.is_empty() {
            return Err(MigrationError::UnknownTable(table.to_string()));
        }
        Ok(rows.into_iter().collect())
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR)
            FROM information_schema.STATISTICS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
            "#,
        )
        .bind(self.resolve(table))
        .fetch_all(&self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, column)| IndexInfo { name, column })
            .collect())
    }

    async fn add_column(&self, table: &str, column: &ColumnSpec) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote(&self.resolve(table)),
            column_definition(column)
        );
        self.ddl(table, &column.name, sql).await
    }

    async fn modify_column(&self, table: &str, column: &ColumnSpec) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            quote(&self.resolve(table)),
            column_definition(column)
        );
        self.ddl(table, &column.name, sql).await
    }

    async fn add_index(&self, table: &str, index: &IndexSpec) -> Result<()> {
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|(column, order)| format!("{} {}", quote(column), order.as_sql()))
            .collect();
        let sql = format!(
            "ALTER TABLE {} ADD INDEX {} ({})",
            quote(&self.resolve(table)),
            quote(&index.name),
            columns.join(", ")
        );
        self.ddl(table, &index.name, sql).await
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote(&self.resolve(table)),
            quote(column)
        );
        self.ddl(table, column, sql).await
    }

    async fn drop_index(&self, table: &str, index: &str) -> Result<()> {
        let sql = format!(
            "ALTER TABLE {} DROP INDEX {}",
            quote(&self.resolve(table)),
            quote(index)
        );
        self.ddl(table, index, sql).await
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", quote(&self.resolve(table)));
        self.ddl(table, table, sql).await
    }

    async fn count_rows(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT COUNT(*) FROM {}",
            quote(&self.resolve(table))
        ));
        push_filters(&mut builder, filters, false);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool())
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<Row>> {
        let mut builder = self.select(request.table, request.columns);
        builder
            .push(" WHERE ")
            .push(quote(PRIMARY_KEY))
            .push(" > ")
            .push_bind(request.after);
        push_filters(&mut builder, request.filters, true);
        builder
            .push(" ORDER BY ")
            .push(quote(PRIMARY_KEY))
            .push(" ASC LIMIT ")
            .push_bind(i64::from(request.limit));

        let rows = builder.build().fetch_all(&self.pool()).await?;
        rows.iter()
            .map(|row| read_row(row, request.columns))
            .collect()
    }

    async fn fetch_one(
        &self,
        table: &str,
        columns: &[String],
        filters: &[Filter],
    ) -> Result<Option<Row>> {
        let mut builder = self.select(table, columns);
        push_filters(&mut builder, filters, false);
        builder.push(" LIMIT 1");

        match builder.build().fetch_optional(&self.pool()).await? {
            Some(row) => Ok(Some(read_row(&row, columns)?)),
            None => Ok(None),
        }
    }

    async fn next_primary_keys(&self, table: &str, after: i64, limit: u32) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(&format!(
            "SELECT CAST({0} AS SIGNED) FROM {1} WHERE {0} > ? ORDER BY {0} ASC LIMIT ?",
            quote(PRIMARY_KEY),
            quote(&self.resolve(table))
        ))
        .bind(after)
        .bind(i64::from(limit))
        .fetch_all(&self.pool())
        .await?;
        Ok(ids)
    }

    async fn select_ints(
        &self,
        table: &str,
        column: &str,
        filters: &[Filter],
    ) -> Result<Vec<i64>> {
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "SELECT CAST({} AS SIGNED) FROM {}",
            quote(column),
            quote(&self.resolve(table))
        ));
        push_filters(&mut builder, filters, false);

        let values: Vec<Option<i64>> = builder
            .build_query_scalar()
            .fetch_all(&self.pool())
            .await?;
        Ok(values.into_iter().map(|v| v.unwrap_or(0)).collect())
    }

    async fn exists(&self, table: &str, filters: &[Filter]) -> Result<bool> {
        let mut builder =
            QueryBuilder::<MySql>::new(format!("SELECT 1 FROM {}", quote(&self.resolve(table))));
        push_filters(&mut builder, filters, false);
        builder.push(" LIMIT 1");

        let found = builder.build().fetch_optional(&self.pool()).await?;
        Ok(found.is_some())
    }

    async fn update_by_id(&self, table: &str, id: i64, values: &Row) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::<MySql>::new(format!("UPDATE {} SET ", quote(&self.resolve(table))));
        for (position, (column, value)) in values.iter().enumerate() {
            if position > 0 {
                builder.push(", ");
            }
            builder.push(quote(column)).push(" = ");
            push_value(&mut builder, value);
        }
        builder
            .push(" WHERE ")
            .push(quote(PRIMARY_KEY))
            .push(" = ")
            .push_bind(id);

        builder.build().execute(&self.pool()).await?;
        Ok(())
    }

    async fn update_where(
        &self,
        table: &str,
        assignments: &[Assignment],
        filters: &[Filter],
    ) -> Result<u64> {
        if assignments.is_empty() {
            return Ok(0);
        }

        let mut builder =
            QueryBuilder::<MySql>::new(format!("UPDATE {} SET ", quote(&self.resolve(table))));
        for (position, assignment) in assignments.iter().enumerate() {
            if position > 0 {
                builder.push(", ");
            }
            match assignment {
                Assignment::Value(column, value) => {
                    builder.push(quote(column)).push(" = ");
                    push_value(&mut builder, value);
                }
                Assignment::Column(column, source) => {
                    builder
                        .push(quote(column))
                        .push(" = ")
                        .push(quote(source));
                }
            }
        }
        push_filters(&mut builder, filters, false);

        let result = builder.build().execute(&self.pool()).await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, table: &str, values: &Row) -> Result<()> {
        let columns: Vec<String> = values.keys().map(|c| quote(c)).collect();
        let mut builder = QueryBuilder::<MySql>::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            quote(&self.resolve(table)),
            columns.join(", ")
        ));
        for (position, value) in values.values().enumerate() {
            if position > 0 {
                builder.push(", ");
            }
            push_value(&mut builder, value);
        }
        builder.push(")");

        builder.build().execute(&self.pool()).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let fresh = MySqlPoolOptions::new()
            .max_connections(5)
            .connect_lazy(&self.url)?;

        let old = {
            let mut pool = self.pool.write().unwrap();
            std::mem::replace(&mut *pool, fresh)
        };
        old.close().await;

        debug!("database connections released");
        Ok(())
    }
}
