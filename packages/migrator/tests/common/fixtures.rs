//! Test fixtures for a RadicalMart 2.x catalog.
//!
//! `legacy_catalog()` builds the in-memory store with every table the 3.0.0
//! migration touches, in its pre-3.0 shape. The `seed_*` helpers add rows.
//! `LEGACY_SCHEMA` is the same structure as MySQL DDL.

use catalog_migrator::db::{MemoryDatabase, SqlValue};
use catalog_migrator::entity::{
    CATEGORIES_ITEMS_TABLE, CATEGORIES_TABLE, EXTENSIONS_TABLE, FIELDS_TABLE, MENU_TABLE,
    METAS_TABLE, ORDERS_TABLE, PRODUCTS_TABLE,
};

pub const PRODUCTS_CATEGORIES_TABLE: &str = "#__radicalmart_products_categories";
pub const METAS_CATEGORIES_TABLE: &str = "#__radicalmart_metas_categories";

/// Empty 2.x catalog with the component extension registered.
pub fn legacy_catalog() -> MemoryDatabase {
    let db = MemoryDatabase::new();

    db.create_table(
        PRODUCTS_TABLE,
        &[
            ("id", "int(11)"),
            ("title", "varchar(255)"),
            ("category", "int(11)"),
            ("categories", "text"),
            ("pathway", "int(11)"),
            ("ordering", "int(11)"),
            ("ordering_price", "int(11)"),
            ("params", "mediumtext"),
            ("created", "datetime"),
            ("created_by", "int(10) unsigned"),
            ("modified", "datetime"),
            ("modified_by", "int(10) unsigned"),
        ],
    );
    db.create_index(PRODUCTS_TABLE, "idx_pathway", &["pathway"]);
    db.create_index(PRODUCTS_TABLE, "idx_ordering", &["ordering"]);
    db.create_index(PRODUCTS_TABLE, "idx_ordering_price", &["ordering_price"]);
    db.create_index(PRODUCTS_TABLE, "idx_createdby", &["created_by"]);

    db.create_table(
        METAS_TABLE,
        &[
            ("id", "int(11)"),
            ("title", "varchar(255)"),
            ("category", "int(11)"),
            ("categories", "text"),
            ("ordering", "int(11)"),
            ("ordering_price", "int(11)"),
            ("products", "mediumtext"),
            ("params", "mediumtext"),
            ("introtext", "mediumtext"),
            ("prices", "mediumtext"),
            ("created", "datetime"),
        ],
    );
    db.create_index(METAS_TABLE, "idx_ordering", &["ordering"]);
    db.create_index(METAS_TABLE, "idx_ordering_price", &["ordering_price"]);

    db.create_table(
        ORDERS_TABLE,
        &[
            ("id", "int(11)"),
            ("created_by", "int(10) unsigned"),
            ("modified_by", "int(10) unsigned"),
        ],
    );
    db.create_index(ORDERS_TABLE, "idx_createdby", &["created_by"]);

    db.create_table(
        CATEGORIES_TABLE,
        &[
            ("id", "int(11)"),
            ("title", "varchar(255)"),
            ("fields", "mediumtext"),
            ("total_products", "int(11)"),
            ("total_metas", "int(11)"),
        ],
    );
    db.create_index(CATEGORIES_TABLE, "idx_total_products", &["total_products"]);
    db.create_index(CATEGORIES_TABLE, "idx_total_metas", &["total_metas"]);

    db.create_table(
        CATEGORIES_ITEMS_TABLE,
        &[
            ("id", "int(11)"),
            ("item_id", "int(11)"),
            ("type", "varchar(100)"),
            ("category_id", "int(11)"),
            ("state", "tinyint(3)"),
            ("ordering", "int(11)"),
        ],
    );

    db.create_table(
        FIELDS_TABLE,
        &[
            ("id", "int(11)"),
            ("alias", "varchar(400)"),
            ("plugin", "varchar(100)"),
            ("fieldset", "int(11) unsigned"),
        ],
    );
    db.create_index(FIELDS_TABLE, "idx_fieldset", &["fieldset"]);

    db.create_table(
        MENU_TABLE,
        &[
            ("id", "int(11)"),
            ("type", "varchar(16)"),
            ("link", "varchar(1024)"),
            ("params", "text"),
        ],
    );

    set_component_params(&db, "{}");

    db.create_table(
        PRODUCTS_CATEGORIES_TABLE,
        &[("product_id", "int(11)"), ("category_id", "int(11)")],
    );
    db.create_table(
        METAS_CATEGORIES_TABLE,
        &[("meta_id", "int(11)"), ("category_id", "int(11)")],
    );

    db
}

/// Legacy product row.
pub fn seed_product(db: &MemoryDatabase, id: i64, category: i64, categories: &str, ordering: i64) {
    db.seed(
        PRODUCTS_TABLE,
        &[
            ("id", SqlValue::Int(id)),
            ("title", SqlValue::Text(format!("Product {}", id))),
            ("category", SqlValue::Int(category)),
            ("categories", SqlValue::from(categories)),
            ("pathway", SqlValue::Int(category)),
            ("ordering", SqlValue::Int(ordering)),
            ("ordering_price", SqlValue::Int(0)),
            ("params", SqlValue::from("{}")),
            ("created", SqlValue::from("2023-04-01 10:00:00")),
            ("created_by", SqlValue::Int(42)),
            ("modified_by", SqlValue::Int(0)),
        ],
    );
}

/// `count` products in category 5, ids `1..=count`.
pub fn seed_products(db: &MemoryDatabase, count: i64) {
    for id in 1..=count {
        seed_product(db, id, 5, "5,8", id);
    }
}

/// Legacy meta-variant row. `created` of `None` leaves the column empty.
pub fn seed_meta(
    db: &MemoryDatabase,
    id: i64,
    products: &str,
    params: &str,
    created: Option<&str>,
) {
    db.seed(
        METAS_TABLE,
        &[
            ("id", SqlValue::Int(id)),
            ("title", SqlValue::Text(format!("Meta {}", id))),
            ("category", SqlValue::Int(5)),
            ("categories", SqlValue::from("0,5,7")),
            ("ordering", SqlValue::Int(id)),
            ("ordering_price", SqlValue::Int(0)),
            ("products", SqlValue::from(products)),
            ("params", SqlValue::from(params)),
            ("introtext", SqlValue::from("")),
            ("prices", SqlValue::from("{}")),
            ("created", created.map(SqlValue::from).unwrap_or(SqlValue::Null)),
        ],
    );
}

pub fn seed_field(db: &MemoryDatabase, id: i64, alias: &str, fieldset: i64) {
    db.seed(
        FIELDS_TABLE,
        &[
            ("id", SqlValue::Int(id)),
            ("alias", SqlValue::from(alias)),
            ("plugin", SqlValue::from("standard")),
            ("fieldset", SqlValue::Int(fieldset)),
        ],
    );
}

pub fn seed_category(db: &MemoryDatabase, id: i64, total_products: i64, total_metas: i64) {
    db.seed(
        CATEGORIES_TABLE,
        &[
            ("id", SqlValue::Int(id)),
            ("title", SqlValue::Text(format!("Category {}", id))),
            ("fields", SqlValue::from("{}")),
            ("total_products", SqlValue::Int(total_products)),
            ("total_metas", SqlValue::Int(total_metas)),
        ],
    );
}

pub fn seed_menu_item(db: &MemoryDatabase, id: i64, item_type: &str, link: &str) {
    db.seed(
        MENU_TABLE,
        &[
            ("id", SqlValue::Int(id)),
            ("type", SqlValue::from(item_type)),
            ("link", SqlValue::from(link)),
            ("params", SqlValue::from("{\"menu_show\":1}")),
        ],
    );
}

/// (Re)create the extensions table holding only the component row.
pub fn set_component_params(db: &MemoryDatabase, params: &str) {
    db.create_table(
        EXTENSIONS_TABLE,
        &[
            ("extension_id", "int(11)"),
            ("element", "varchar(100)"),
            ("params", "text"),
        ],
    );
    db.seed(
        EXTENSIONS_TABLE,
        &[
            ("extension_id", SqlValue::Int(700)),
            ("element", SqlValue::from("com_radicalmart")),
            ("params", SqlValue::from(params)),
        ],
    );
}

/// A small catalog touching every step.
pub fn populated_catalog() -> MemoryDatabase {
    let db = legacy_catalog();

    seed_products(&db, 12);
    seed_field(&db, 3, "color", 2);
    seed_field(&db, 4, "size", 2);
    seed_meta(
        &db,
        1,
        r#"{"0":{"id":"1"},"1":{"id":2}}"#,
        r#"{"variability_fields":{"0":{"alias":"color"},"1":{"alias":"size"}}}"#,
        None,
    );
    seed_meta(&db, 2, r#"{"0":{"id":3}}"#, "{}", Some("2022-01-01 00:00:00"));
    seed_category(&db, 5, 12, 2);
    seed_category(&db, 8, 3, 0);
    seed_menu_item(
        &db,
        101,
        "component",
        "index.php?option=com_radicalmart&view=categories&layout=grid&id=5",
    );
    seed_menu_item(
        &db,
        102,
        "component",
        "index.php?option=com_radicalmart&view=product&id=1",
    );
    set_component_params(&db, r#"{"user_login_code":1,"user_ip":1,"privacy_ip":0}"#);

    db
}

/// 2.x structure as MySQL DDL; `#__` is the table prefix placeholder.
pub const LEGACY_SCHEMA: &[&str] = &[
    "CREATE TABLE `#__radicalmart_products` (
        `id` int(11) NOT NULL AUTO_INCREMENT,
        `title` varchar(255) NOT NULL DEFAULT '',
        `category` int(11) NOT NULL DEFAULT 0,
        `categories` text NULL,
        `pathway` int(11) NOT NULL DEFAULT 0,
        `ordering` int(11) NOT NULL DEFAULT 0,
        `ordering_price` int(11) NOT NULL DEFAULT 0,
        `params` mediumtext NULL,
        `created` datetime NULL,
        `created_by` int(10) unsigned NOT NULL DEFAULT 0,
        `modified` datetime NULL,
        `modified_by` int(10) unsigned NOT NULL DEFAULT 0,
        PRIMARY KEY (`id`),
        KEY `idx_pathway` (`pathway`),
        KEY `idx_ordering` (`ordering`),
        KEY `idx_ordering_price` (`ordering_price`),
        KEY `idx_createdby` (`created_by`)
    )",
    "CREATE TABLE `#__radicalmart_metas` (
        `id` int(11) NOT NULL AUTO_INCREMENT,
        `title` varchar(255) NOT NULL DEFAULT '',
        `category` int(11) NOT NULL DEFAULT 0,
        `categories` text NULL,
        `ordering` int(11) NOT NULL DEFAULT 0,
        `ordering_price` int(11) NOT NULL DEFAULT 0,
        `products` mediumtext NULL,
        `params` mediumtext NULL,
        `introtext` mediumtext NULL,
        `prices` mediumtext NULL,
        `created` datetime NULL,
        PRIMARY KEY (`id`),
        KEY `idx_ordering` (`ordering`),
        KEY `idx_ordering_price` (`ordering_price`)
    )",
    "CREATE TABLE `#__radicalmart_orders` (
        `id` int(11) NOT NULL AUTO_INCREMENT,
        `created_by` int(10) unsigned NOT NULL DEFAULT 0,
        `modified_by` int(10) unsigned NOT NULL DEFAULT 0,
        PRIMARY KEY (`id`),
        KEY `idx_createdby` (`created_by`)
    )",
    "CREATE TABLE `#__radicalmart_categories` (
        `id` int(11) NOT NULL AUTO_INCREMENT,
        `title` varchar(255) NOT NULL DEFAULT '',
        `fields` mediumtext NULL,
        `total_products` int(11) NOT NULL DEFAULT 0,
        `total_metas` int(11) NOT NULL DEFAULT 0,
        PRIMARY KEY (`id`),
        KEY `idx_total_products` (`total_products`),
        KEY `idx_total_metas` (`total_metas`)
    )",
    "CREATE TABLE `#__radicalmart_categories_items` (
        `id` int(11) NOT NULL AUTO_INCREMENT,
        `item_id` int(11) NOT NULL DEFAULT 0,
        `type` varchar(100) NOT NULL DEFAULT '',
        `category_id` int(11) NOT NULL DEFAULT 0,
        `state` tinyint(3) NOT NULL DEFAULT 0,
        `ordering` int(11) NOT NULL DEFAULT 0,
        PRIMARY KEY (`id`)
    )",
    "CREATE TABLE `#__radicalmart_fields` (
        `id` int(11) NOT NULL AUTO_INCREMENT,
        `alias` varchar(400) NOT NULL DEFAULT '',
        `plugin` varchar(100) NOT NULL DEFAULT '',
        `fieldset` int(11) unsigned NOT NULL DEFAULT 0,
        PRIMARY KEY (`id`),
        KEY `idx_fieldset` (`fieldset`)
    )",
    "CREATE TABLE `#__menu` (
        `id` int(11) NOT NULL AUTO_INCREMENT,
        `type` varchar(16) NOT NULL DEFAULT '',
        `link` varchar(1024) NOT NULL DEFAULT '',
        `params` text NULL,
        PRIMARY KEY (`id`)
    )",
    "CREATE TABLE `#__extensions` (
        `extension_id` int(11) NOT NULL AUTO_INCREMENT,
        `element` varchar(100) NOT NULL DEFAULT '',
        `params` text NULL,
        PRIMARY KEY (`extension_id`)
    )",
    "CREATE TABLE `#__radicalmart_products_categories` (
        `product_id` int(11) NOT NULL DEFAULT 0,
        `category_id` int(11) NOT NULL DEFAULT 0
    )",
    "CREATE TABLE `#__radicalmart_metas_categories` (
        `meta_id` int(11) NOT NULL DEFAULT 0,
        `category_id` int(11) NOT NULL DEFAULT 0
    )",
];

/// Rows for the MySQL catalog, in `LEGACY_SCHEMA` table names.
pub const LEGACY_ROWS: &[&str] = &[
    "INSERT INTO `#__radicalmart_products` (`id`, `title`, `category`, `categories`, `pathway`, `ordering`, `params`)
        VALUES (1, 'First', 5, '0,5,7', 5, 3, '{}'), (2, 'Second', 5, '5', 5, 1, '{}'), (42, 'Answer', 8, '8,5', 8, 3, '{}')",
    "INSERT INTO `#__radicalmart_metas` (`id`, `title`, `category`, `categories`, `ordering`, `products`, `params`)
        VALUES (9, 'Shirt', 5, '5,8', 2, '{\"0\":{\"id\":\"1\"},\"1\":{\"id\":2}}', '{\"variability_fields\":{\"0\":{\"alias\":\"color\"}}}')",
    "INSERT INTO `#__radicalmart_categories` (`id`, `title`, `fields`, `total_products`, `total_metas`)
        VALUES (5, 'Shirts', '{}', 2, 1), (8, 'Misc', '{}', 1, 0)",
    "INSERT INTO `#__radicalmart_fields` (`id`, `alias`, `plugin`, `fieldset`) VALUES (3, 'color', 'standard', 2)",
    "INSERT INTO `#__menu` (`id`, `type`, `link`, `params`)
        VALUES (101, 'component', 'index.php?option=com_radicalmart&view=categories&layout=grid', '{}')",
    "INSERT INTO `#__extensions` (`extension_id`, `element`, `params`)
        VALUES (700, 'com_radicalmart', '{\"user_login_code\":1}')",
];
