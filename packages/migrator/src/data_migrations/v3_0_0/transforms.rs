//! Pure legacy-row transforms of the 3.0.0 migration.
//!
//! Nothing here touches the database; the steps feed rows in and write the
//! returned patches back.

use serde_json::Value;
use url::form_urlencoded;

use crate::db::{coerce_int, row_id, Row, SqlValue};
use crate::entity::{EntityKind, OrderingEntry};
use crate::error::{MigrationError, Result};
use crate::registry::Registry;

/// Format of `created` / `modified` columns.
pub const SQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Layout used when a legacy categories link carries none.
pub const DEFAULT_CATEGORIES_LAYOUT: &str = "categories";

/// Parse a JSON blob column of a scanned row.
pub fn parse_blob(table: &str, row: &Row, column: &str) -> Result<Registry> {
    let raw = row.get(column).map(SqlValue::as_text).unwrap_or_default();
    Registry::from_blob(&raw)
        .map_err(|e| MigrationError::data(table, row_id(row), format!("`{}`: {}", column, e)))
}

/// Additional categories from a legacy comma list: integer-coerced, without
/// `0` and the primary category, order preserved. `None` for an empty list.
pub fn split_additional_categories(raw: &SqlValue, primary: i64) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let additional: Vec<String> = raw
        .as_text()
        .split(',')
        .map(coerce_int)
        .filter(|id| *id != 0 && *id != primary)
        .map(|id| id.to_string())
        .collect();

    Some(additional.join(","))
}

/// Category columns shared by products and metas.
fn category_patch(row: &Row, patch: &mut Row) {
    let primary = row.get("category").map(SqlValue::as_int).unwrap_or(0);
    if let Some(additional) = row
        .get("categories")
        .and_then(|raw| split_additional_categories(raw, primary))
    {
        patch.insert("categories_additional".into(), SqlValue::Text(additional));
    }
}

/// Target columns of a product row.
pub fn product_patch(row: &Row) -> Row {
    let mut patch = Row::new();

    if let Some(pathway) = row.get("pathway").filter(|value| !value.is_empty()) {
        patch.insert("category_pathway".into(), SqlValue::Int(pathway.as_int()));
    }
    category_patch(row, &mut patch);

    patch
}

/// Target columns of a meta row that need no lookups; `now` fills an empty
/// `created`.
pub fn meta_patch(row: &Row, now: &str) -> Row {
    let mut patch = Row::new();

    category_patch(row, &mut patch);
    if row.get("created").map_or(true, SqlValue::is_empty) {
        patch.insert("created".into(), SqlValue::from(now));
    }

    patch
}

/// The part of `patch` that differs from what the row already holds.
pub fn changed_columns(row: &Row, patch: Row) -> Row {
    patch
        .into_iter()
        .filter(|(column, value)| match row.get(column) {
            Some(current) => !current.same_as(value),
            None => true,
        })
        .collect()
}

/// Root ordering entry for a row that still carries a legacy `ordering`.
pub fn ordering_entry(kind: EntityKind, id: i64, row: &Row) -> Option<OrderingEntry> {
    row.get("ordering")
        .map(|ordering| OrderingEntry::root(kind, id, ordering.as_int()))
}

/// Shape of `variability_fields` in a meta's params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariabilityFields {
    /// Not set
    Absent,
    /// Already a list of field ids
    Resolved,
    /// Legacy object; aliases of its entries in stored order
    Aliases(Vec<String>),
    /// Any other shape
    Unrecognized,
}

pub fn variability_fields(params: &Registry) -> VariabilityFields {
    match params.get("variability_fields") {
        None | Some(Value::Bool(false)) => VariabilityFields::Absent,
        Some(Value::String(text)) if text.is_empty() => VariabilityFields::Absent,
        Some(Value::Array(_)) => VariabilityFields::Resolved,
        Some(Value::Object(fields)) => VariabilityFields::Aliases(
            fields
                .values()
                .filter_map(|field| match field.get("alias")? {
                    Value::Null => None,
                    Value::String(alias) => Some(alias.clone()),
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
        Some(_) => VariabilityFields::Unrecognized,
    }
}

/// Positive `id`s of the products listed in a meta's `products` blob.
pub fn member_product_ids(products: &Registry) -> Vec<i64> {
    products
        .values()
        .filter_map(|product| match product.get("id")? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => Some(coerce_int(text)),
            _ => None,
        })
        .filter(|id| *id > 0)
        .collect()
}

/// Fold legacy `total_products` / `total_metas` into `totals`.
/// `None` when `totals` already holds those values.
pub fn consolidate_totals(table: &str, row: &Row) -> Result<Option<Registry>> {
    let current = parse_blob(table, row, "totals")?;
    let mut totals = current.clone();

    if let Some(products) = row.get("total_products") {
        totals.set("products", Value::from(products.as_int()));
    }
    if let Some(metas) = row.get("total_metas") {
        totals.set("metas", Value::from(metas.as_int()));
    }

    if totals == current {
        Ok(None)
    } else {
        Ok(Some(totals))
    }
}

/// Point a legacy categories menu link at the category view.
///
/// `view` becomes `category` and `layout` is kept (or defaulted), so the
/// returned layout can be carried into the item params. Query order and the
/// fragment are preserved.
pub fn rewrite_menu_link(link: &str) -> (String, String) {
    let (location, fragment) = match link.split_once('#') {
        Some((location, fragment)) => (location, Some(fragment)),
        None => (link, None),
    };
    let (path, query) = location.split_once('?').unwrap_or((location, ""));

    let mut pairs: Vec<(String, String)> =
        form_urlencoded::parse(query.as_bytes()).into_owned().collect();

    let layout = pairs
        .iter()
        .find(|(key, value)| key == "layout" && !value.is_empty())
        .map(|(_, value)| value.clone())
        .unwrap_or_else(|| DEFAULT_CATEGORIES_LAYOUT.to_string());

    set_pair(&mut pairs, "view", "category");
    set_pair(&mut pairs, "layout", &layout);

    // Stored links keep decoded values
    let query = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    let mut rewritten = format!("{}?{}", path, query);
    if let Some(fragment) = fragment {
        rewritten.push('#');
        rewritten.push_str(fragment);
    }
    (rewritten, layout)
}

fn set_pair(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    match pairs.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => *existing = value.to_string(),
        None => pairs.push((key.to_string(), value.to_string())),
    }
}

/// Menu item params for the category view.
pub fn menu_params(params: &mut Registry, layout: &str) {
    params.set("view_categories_layout", Value::from(layout));
    params.set("view_products_layout", Value::from("_:default"));
}
