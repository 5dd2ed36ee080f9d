//! Storage backends and the value/statement types they share.
//!
//! Backends implement [`BaseDatabase`](crate::kernel::BaseDatabase):
//! - [`MySqlDatabase`]: the production store behind the catalog
//! - [`MemoryDatabase`]: in-process store with a statement journal (tests)
//!
//! Table names carry the `#__` prefix placeholder; backends resolve it.

pub mod memory;
pub mod mysql;

pub use memory::{MemoryDatabase, Statement};
pub use mysql::MySqlDatabase;

use indexmap::IndexMap;
use std::borrow::Cow;
use std::fmt;

/// Primary key column of every scanned table.
pub const PRIMARY_KEY: &str = "id";

/// A column value as read from or written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
}

impl SqlValue {
    /// Integer coercion: NULL is 0, text goes through [`coerce_int`].
    pub fn as_int(&self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Int(value) => *value,
            Self::Text(text) => coerce_int(text),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::Int(value) => Cow::Owned(value.to_string()),
            Self::Text(text) => Cow::Borrowed(text.as_str()),
        }
    }

    /// Emptiness as legacy rows define it: NULL, `""`, `"0"` and `0`.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Int(value) => *value == 0,
            Self::Text(text) => text.is_empty() || text == "0",
        }
    }

    /// Compare across representations (`Int(5)` matches `Text("5")`).
    pub fn same_as(&self, other: &SqlValue) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, _) | (_, Self::Null) => false,
            (a, b) => a.as_text() == b.as_text(),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(value) => write!(f, "{}", value),
            Self::Text(text) => write!(f, "'{}'", text),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map(Self::Text).unwrap_or(Self::Null)
    }
}

/// Integer coercion for legacy text values.
///
/// Leading whitespace, an optional sign and the leading digits are read;
/// anything else yields what was read so far, so `"abc"` is `0` and `"12ab"`
/// is `12`. Overflow saturates.
pub fn coerce_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value.saturating_mul(10).saturating_add(i64::from(byte - b'0'));
    }

    if negative {
        -value
    } else {
        value
    }
}

/// A row keyed by column name, in select order.
pub type Row = IndexMap<String, SqlValue>;

/// Primary key of a scanned row (`0` when missing).
pub fn row_id(row: &Row) -> i64 {
    row.get(PRIMARY_KEY).map(SqlValue::as_int).unwrap_or(0)
}

/// Column to add or modify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub after: Option<String>,
}

impl ColumnSpec {
    /// Nullable column without default.
    pub fn new(name: &str, sql_type: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable: true,
            default: None,
            after: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Raw SQL default literal (`"0"`, `"'x'"`).
    pub fn default(mut self, literal: &str) -> Self {
        self.default = Some(literal.to_string());
        self
    }

    pub fn after(mut self, column: &str) -> Self {
        self.after = Some(column.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Index to add; identity is the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<(String, SortOrder)>,
}

impl IndexSpec {
    /// Single or multi-column ascending index.
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|c| (c.to_string(), SortOrder::Asc))
                .collect(),
        }
    }

    pub fn ordered(name: &str, columns: &[(&str, SortOrder)]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|(c, o)| (c.to_string(), *o)).collect(),
        }
    }
}

/// One (index, column) pair of live index metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub column: String,
}

/// WHERE predicate; predicates are joined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, SqlValue),
    NotEq(String, SqlValue),
    In(String, Vec<SqlValue>),
    /// SQL `LIKE` with `%` and `_` wildcards
    Like(String, String),
}

/// SET clause of a bulk update.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Value(String, SqlValue),
    /// Copy another column of the same row
    Column(String, String),
}

/// One keyset page: `id > after ORDER BY id ASC LIMIT limit`.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub table: &'a str,
    pub columns: &'a [String],
    pub filters: &'a [Filter],
    pub after: i64,
    pub limit: u32,
}
