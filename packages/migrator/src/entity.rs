//! Catalog entity kinds and the shared ordering table format.

use std::fmt;

use crate::db::{Filter, Row, SqlValue};

pub const PRODUCTS_TABLE: &str = "#__radicalmart_products";
pub const METAS_TABLE: &str = "#__radicalmart_metas";
pub const CATEGORIES_TABLE: &str = "#__radicalmart_categories";
pub const CATEGORIES_ITEMS_TABLE: &str = "#__radicalmart_categories_items";
pub const FIELDS_TABLE: &str = "#__radicalmart_fields";
pub const ORDERS_TABLE: &str = "#__radicalmart_orders";
pub const MENU_TABLE: &str = "#__menu";
pub const EXTENSIONS_TABLE: &str = "#__extensions";

/// Root catalog category; ordering entries created by backfills live here.
pub const ROOT_CATEGORY: i64 = 1;

/// Entities that can be backfilled and re-saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Product,
    Meta,
}

impl EntityKind {
    /// Storage table of this entity.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Product => PRODUCTS_TABLE,
            Self::Meta => METAS_TABLE,
        }
    }

    /// Name of the admin model that owns saves for this entity.
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Product => "Product",
            Self::Meta => "Meta",
        }
    }

    /// Value of the `type` column in the ordering table.
    pub fn ordering_type(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Meta => "meta",
        }
    }

    /// Human label used in progress notes.
    pub fn plural_label(&self) -> &'static str {
        match self {
            Self::Product => "Products",
            Self::Meta => "Meta products",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ordering_type())
    }
}

/// `item_id` of the ordering table.
///
/// Products and meta-variants share one ordering table; meta rows are stored
/// with their primary key negated. This is a legacy storage format kept for
/// compatibility. Do not extend it to other kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingItemId(i64);

impl OrderingItemId {
    pub fn encode(kind: EntityKind, id: i64) -> Self {
        match kind {
            EntityKind::Product => Self(id),
            EntityKind::Meta => Self(-id),
        }
    }

    /// Recover kind and primary key from a stored value. `0` is not a valid id.
    pub fn decode(raw: i64) -> Option<(EntityKind, i64)> {
        match raw {
            0 => None,
            id if id > 0 => Some((EntityKind::Product, id)),
            id => Some((EntityKind::Meta, -id)),
        }
    }

    pub fn raw(&self) -> i64 {
        self.0
    }
}

/// Row of `#__radicalmart_categories_items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingEntry {
    pub kind: EntityKind,
    pub item_id: OrderingItemId,
    pub category_id: i64,
    pub state: i64,
    pub ordering: i64,
}

impl OrderingEntry {
    /// Disabled root-category entry carrying a legacy ordering value.
    pub fn root(kind: EntityKind, id: i64, ordering: i64) -> Self {
        Self {
            kind,
            item_id: OrderingItemId::encode(kind, id),
            category_id: ROOT_CATEGORY,
            state: 0,
            ordering,
        }
    }

    /// Point lookup keyed by (category, type, item).
    pub fn lookup(&self) -> Vec<Filter> {
        vec![
            Filter::Eq("category_id".into(), SqlValue::Int(self.category_id)),
            Filter::Eq("type".into(), SqlValue::from(self.kind.ordering_type())),
            Filter::Eq("item_id".into(), SqlValue::Int(self.item_id.raw())),
        ]
    }

    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("item_id".into(), SqlValue::Int(self.item_id.raw()));
        row.insert("type".into(), SqlValue::from(self.kind.ordering_type()));
        row.insert("category_id".into(), SqlValue::Int(self.category_id));
        row.insert("state".into(), SqlValue::Int(self.state));
        row.insert("ordering".into(), SqlValue::Int(self.ordering));
        row
    }
}
