//! Integration tests for the 3.0.0 migration against the in-memory store.
//!
//! Covers:
//! - Full conversion of a 2.x catalog
//! - Re-runs that change nothing
//! - Paging, interruption and resumption of backfills
//! - Per-step edge cases (params, menu items, categories, fields, resaves)

mod common;

use crate::common::*;
use catalog_migrator::data_migrations::v3_0_0::{
    CategoriesStructureStep, ComponentParamsStep, EntityStructureStep, FieldsStructureStep,
    MenuItemsStep, RadicalMart300, ResaveStep, UsersColumnsStep,
};
use catalog_migrator::db::{MemoryDatabase, Row, SqlValue};
use catalog_migrator::engine::{MigrationRunner, RunState};
use catalog_migrator::entity::{
    EntityKind, CATEGORIES_ITEMS_TABLE, CATEGORIES_TABLE, EXTENSIONS_TABLE, FIELDS_TABLE,
    MENU_TABLE, METAS_TABLE, ORDERS_TABLE, PRODUCTS_TABLE,
};
use catalog_migrator::kernel::{MockDomainModel, TestDependencies};
use catalog_migrator::MigrationError;
use serde_json::{json, Value};

fn populated() -> TestDependencies {
    TestDependencies::new()
        .with_database(populated_catalog())
        .with_domain(
            MockDomainModel::new()
                .with_ids(EntityKind::Product, 1..=12)
                .with_ids(EntityKind::Meta, 1..=2),
        )
}

fn cell(row: &Row, column: &str) -> SqlValue {
    row.get(column).cloned().unwrap_or(SqlValue::Null)
}

fn json_cell(row: &Row, column: &str) -> Value {
    serde_json::from_str(&cell(row, column).as_text()).unwrap()
}

/// Ordering rows of one entity, as (category_id, state, ordering).
fn ordering_entries(test: &TestDependencies, kind: EntityKind, id: i64) -> Vec<(i64, i64, i64)> {
    let item_id = match kind {
        EntityKind::Product => id,
        EntityKind::Meta => -id,
    };
    test.db
        .rows(CATEGORIES_ITEMS_TABLE)
        .into_iter()
        .filter(|row| {
            cell(row, "item_id").as_int() == item_id
                && cell(row, "type").as_text() == kind.ordering_type()
        })
        .map(|row| {
            (
                cell(&row, "category_id").as_int(),
                cell(&row, "state").as_int(),
                cell(&row, "ordering").as_int(),
            )
        })
        .collect()
}

// =============================================================================
// Full migration
// =============================================================================

#[tokio::test]
async fn full_migration_converts_products() {
    let test = populated();

    let report = run_migration(&test).await.unwrap();
    assert_eq!(report.steps.len(), 10);

    let product = test.db.row(PRODUCTS_TABLE, 1).unwrap();
    assert_eq!(cell(&product, "category_pathway").as_int(), 5);
    assert_eq!(cell(&product, "categories_additional").as_text(), "8");

    let columns = test.db.column_names(PRODUCTS_TABLE);
    for legacy in ["categories", "pathway", "ordering", "ordering_price"] {
        assert!(!columns.contains(&legacy.to_string()), "{} still present", legacy);
    }
    for added in ["category_route", "categories_all", "meta_variability", "changelogs"] {
        assert!(columns.contains(&added.to_string()), "{} missing", added);
    }

    let indexes = test.db.index_names(PRODUCTS_TABLE);
    assert!(indexes.contains(&"idx_meta_variability".to_string()));
    assert!(indexes.contains(&"idx_created_by".to_string()));
    assert!(!indexes.contains(&"idx_createdby".to_string()));
    assert!(!indexes.contains(&"idx_pathway".to_string()));

    assert!(!test.db.has_table(PRODUCTS_CATEGORIES_TABLE));
    assert!(!test.db.has_table(METAS_CATEGORIES_TABLE));
}

#[tokio::test]
async fn full_migration_converts_metas_and_links_products() {
    let test = populated();

    run_migration(&test).await.unwrap();

    let meta = test.db.row(METAS_TABLE, 1).unwrap();
    assert_eq!(
        json_cell(&meta, "params"),
        json!({"variability_fields": [3, 4]})
    );
    assert_eq!(cell(&meta, "categories_additional").as_text(), "7");
    assert!(!cell(&meta, "created").is_empty());

    let dated = test.db.row(METAS_TABLE, 2).unwrap();
    assert_eq!(cell(&dated, "created").as_text(), "2022-01-01 00:00:00");

    let linked: Vec<i64> = (1..=4)
        .map(|id| {
            let product = test.db.row(PRODUCTS_TABLE, id).unwrap();
            cell(&product, "meta_variability").as_int()
        })
        .collect();
    assert_eq!(linked, vec![1, 1, 2, 0]);

    assert_eq!(ordering_entries(&test, EntityKind::Meta, 2), vec![(1, 0, 2)]);
    assert_eq!(test.db.rows(CATEGORIES_ITEMS_TABLE).len(), 14);
}

#[tokio::test]
async fn full_migration_updates_supporting_tables() {
    let test = populated();

    run_migration(&test).await.unwrap();

    // Categories
    let category = test.db.row(CATEGORIES_TABLE, 5).unwrap();
    assert_eq!(json_cell(&category, "totals"), json!({"products": 12, "metas": 2}));
    assert_eq!(test.db.column_type(CATEGORIES_TABLE, "fields").as_deref(), Some("text"));
    assert!(!test
        .db
        .column_names(CATEGORIES_TABLE)
        .contains(&"total_products".to_string()));

    // Fields
    let field = test.db.row(FIELDS_TABLE, 3).unwrap();
    assert_eq!(cell(&field, "fieldset_site").as_int(), 2);
    assert_eq!(cell(&field, "fieldset_administrator").as_int(), 2);
    assert!(!test.db.column_names(FIELDS_TABLE).contains(&"fieldset".to_string()));

    // Users columns
    assert_eq!(
        test.db.column_type(ORDERS_TABLE, "created_by").as_deref(),
        Some("int(10)")
    );
    assert!(test
        .db
        .index_names(ORDERS_TABLE)
        .contains(&"idx_created_by".to_string()));

    // Menu
    let item = test.db.row(MENU_TABLE, 101).unwrap();
    assert_eq!(
        cell(&item, "link").as_text(),
        "index.php?option=com_radicalmart&view=category&layout=grid&id=5"
    );
    let params = json_cell(&item, "params");
    assert_eq!(params["menu_show"], json!(1));
    assert_eq!(params["view_categories_layout"], json!("grid"));
    assert_eq!(params["view_products_layout"], json!("_:default"));

    let untouched = test.db.row(MENU_TABLE, 102).unwrap();
    assert_eq!(
        cell(&untouched, "link").as_text(),
        "index.php?option=com_radicalmart&view=product&id=1"
    );

    // Component params
    let extensions = test.db.rows(EXTENSIONS_TABLE);
    let params = json_cell(&extensions[0], "params");
    assert_eq!(params["login_code"], json!(1));
    assert!(params.get("user_login_code").is_none());
}

#[tokio::test]
async fn full_migration_resaves_every_entity() {
    let test = populated();

    let report = run_migration(&test).await.unwrap();

    assert_eq!(report.step("resave_products").map(|s| s.rows_updated), Some(12));
    assert_eq!(report.step("resave_metas").map(|s| s.rows_updated), Some(2));
    assert!(test.domain.identity_assumed());
    assert_eq!(
        test.domain.saved_ids(EntityKind::Product),
        (1..=12).collect::<Vec<_>>()
    );
    assert_eq!(test.domain.saved_ids(EntityKind::Meta), vec![1, 2]);
    assert!(test.cache.resets() > 0);
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let test = populated();
    run_migration(&test).await.unwrap();
    test.db.clear_journal();

    let report = run_migration(&test).await.unwrap();

    assert_eq!(test.db.ddl_count(), 0, "journal: {:?}", test.db.journal());
    assert_eq!(test.db.write_count(), 0, "journal: {:?}", test.db.journal());
    for step in report.steps.iter().filter(|step| !step.name.starts_with("resave")) {
        assert!(step.summary.already_current, "{} did work", step.name);
    }

    let notes = test.progress.notes();
    for expected in [
        "Products structure is correct",
        "Meta products structure is correct",
        "Categories structure is correct",
        "Fields structure is correct",
        "Legacy menu items not found",
        "Params are up to date",
    ] {
        assert!(notes.contains(&expected.to_string()), "missing note {:?}", expected);
    }
}

#[tokio::test]
async fn runner_stops_at_resave_without_domain_model() {
    let test = TestDependencies::new().with_database(populated_catalog());
    let mut runner = MigrationRunner::for_migration(&RadicalMart300);

    let error = runner.run(&test.deps_without_domain()).await.unwrap_err();

    assert!(matches!(
        error,
        MigrationError::Step {
            step: "resave_products",
            ..
        }
    ));
    assert!(matches!(
        error.root(),
        MigrationError::MissingCollaborator(_)
    ));
    assert_eq!(runner.state(), RunState::Failed { step: 8 });
}

#[tokio::test]
async fn structure_only_run_completes_without_domain_model() {
    let test = TestDependencies::new().with_database(populated_catalog());
    let mut runner = MigrationRunner::for_migration(&RadicalMart300).without_resave();

    let report = runner.run(&test.deps_without_domain()).await.unwrap();

    assert_eq!(report.steps.len(), 8);
    assert_eq!(runner.state(), RunState::Completed);
    assert!(test.domain.saves().is_empty());
}

// =============================================================================
// Backfill paging and resumption
// =============================================================================

#[tokio::test]
async fn backfill_visits_every_row_once_for_any_page_size() {
    // 7 rows: one row per page, exactly one full page, one short page
    for (page_size, expected_reads) in [(1, 8), (7, 2), (8, 1)] {
        let db = legacy_catalog();
        seed_products(&db, 7);
        let test = TestDependencies::new()
            .with_database(db)
            .with_page_size(page_size);

        let summary = run_step(&EntityStructureStep::new(EntityKind::Product), &test)
            .await
            .unwrap();

        assert_eq!(summary.rows_scanned, 7, "page size {}", page_size);
        assert_eq!(
            test.db.updated_ids(PRODUCTS_TABLE),
            (1..=7).collect::<Vec<_>>(),
            "page size {}",
            page_size
        );
        let reads = test
            .db
            .page_reads()
            .into_iter()
            .filter(|(table, _)| table == PRODUCTS_TABLE)
            .count();
        assert_eq!(reads, expected_reads, "page size {}", page_size);
        assert_eq!(test.db.rows(CATEGORIES_ITEMS_TABLE).len(), 7);
    }
}

#[tokio::test]
async fn backfill_releases_resources_after_each_page() {
    let db = legacy_catalog();
    seed_products(&db, 5);
    let test = TestDependencies::new().with_database(db).with_page_size(2);

    run_step(&EntityStructureStep::new(EntityKind::Product), &test)
        .await
        .unwrap();

    assert_eq!(test.db.disconnect_count(), 3);
    assert_eq!(test.cache.resets(), 3);
}

#[tokio::test]
async fn interrupted_backfill_resumes_where_data_is_missing() {
    let db = legacy_catalog();
    for id in 1..=10 {
        seed_product(&db, id, id + 100, "0", id);
    }
    db.fail_updates_for(PRODUCTS_TABLE, 8);
    let test = TestDependencies::new().with_database(db).with_page_size(3);
    let step = EntityStructureStep::new(EntityKind::Product);

    let error = run_step(&step, &test).await.unwrap_err();
    assert!(matches!(error, MigrationError::Storage(_)));
    assert_eq!(
        test.db.updated_ids(PRODUCTS_TABLE),
        (1..=7).collect::<Vec<_>>()
    );
    // Legacy columns are kept until the backfill completes
    assert!(test
        .db
        .column_names(PRODUCTS_TABLE)
        .contains(&"pathway".to_string()));

    test.db.clear_failures();
    test.db.clear_journal();
    run_step(&step, &test).await.unwrap();

    assert_eq!(test.db.updated_ids(PRODUCTS_TABLE), vec![8, 9, 10]);
    for id in 1..=10 {
        assert_eq!(
            ordering_entries(&test, EntityKind::Product, id),
            vec![(1, 0, id)],
            "product {}",
            id
        );
    }
}

// =============================================================================
// Products and metas
// =============================================================================

#[tokio::test]
async fn additional_categories_drop_zero_and_primary() {
    let db = legacy_catalog();
    seed_product(&db, 1, 5, "0,5,7", 0);
    seed_product(&db, 2, 5, "", 0);
    let test = TestDependencies::new().with_database(db);

    run_step(&EntityStructureStep::new(EntityKind::Product), &test)
        .await
        .unwrap();

    let first = test.db.row(PRODUCTS_TABLE, 1).unwrap();
    assert_eq!(cell(&first, "categories_additional").as_text(), "7");
    let second = test.db.row(PRODUCTS_TABLE, 2).unwrap();
    assert_eq!(cell(&second, "categories_additional"), SqlValue::Null);
}

#[tokio::test]
async fn legacy_ordering_becomes_one_root_entry() {
    let db = legacy_catalog();
    seed_product(&db, 42, 8, "8", 3);
    let test = TestDependencies::new().with_database(db);

    let summary = run_step(&EntityStructureStep::new(EntityKind::Product), &test)
        .await
        .unwrap();

    assert_eq!(summary.rows_inserted, 1);
    assert_eq!(
        ordering_entries(&test, EntityKind::Product, 42),
        vec![(1, 0, 3)]
    );
}

#[tokio::test]
async fn existing_ordering_entry_is_not_duplicated() {
    let db = legacy_catalog();
    seed_product(&db, 42, 8, "8", 3);
    db.seed(
        CATEGORIES_ITEMS_TABLE,
        &[
            ("item_id", SqlValue::Int(42)),
            ("type", SqlValue::from("product")),
            ("category_id", SqlValue::Int(1)),
            ("state", SqlValue::Int(0)),
            ("ordering", SqlValue::Int(3)),
        ],
    );
    let test = TestDependencies::new().with_database(db);

    let summary = run_step(&EntityStructureStep::new(EntityKind::Product), &test)
        .await
        .unwrap();

    assert_eq!(summary.rows_inserted, 0);
    assert_eq!(ordering_entries(&test, EntityKind::Product, 42).len(), 1);
}

#[tokio::test]
async fn empty_table_still_loses_legacy_structure() {
    let test = TestDependencies::new().with_database(legacy_catalog());

    let summary = run_step(&EntityStructureStep::new(EntityKind::Product), &test)
        .await
        .unwrap();

    assert_eq!(summary.rows_scanned, 0);
    assert!(test.progress.notes().contains(&"Products not found".to_string()));
    assert!(!test
        .db
        .column_names(PRODUCTS_TABLE)
        .contains(&"ordering".to_string()));
}

#[tokio::test]
async fn unresolvable_variability_fields_are_skipped() {
    let db = legacy_catalog();
    seed_meta(&db, 1, "{}", r#"{"variability_fields":"broken"}"#, None);
    seed_meta(
        &db,
        2,
        "{}",
        r#"{"variability_fields":{"0":{"alias":"missing"}}}"#,
        None,
    );
    let test = TestDependencies::new().with_database(db);

    let summary = run_step(&EntityStructureStep::new(EntityKind::Meta), &test)
        .await
        .unwrap();

    assert_eq!(summary.rows_skipped, 2);
    let meta = test.db.row(METAS_TABLE, 1).unwrap();
    assert_eq!(
        json_cell(&meta, "params"),
        json!({"variability_fields": "broken"})
    );
    assert!(test.progress.notes().contains(
        &"2 meta products have variability fields that could not be resolved".to_string()
    ));
}

#[tokio::test]
async fn malformed_products_blob_is_a_data_error() {
    let db = legacy_catalog();
    seed_meta(&db, 4, "{not json", "{}", None);
    let test = TestDependencies::new().with_database(db);

    let error = run_step(&EntityStructureStep::new(EntityKind::Meta), &test)
        .await
        .unwrap_err();

    assert!(matches!(error, MigrationError::Data { .. }));
    assert!(error.to_string().contains("row 4"));
}

// =============================================================================
// Params, menu, categories, fields, users
// =============================================================================

#[tokio::test]
async fn params_are_renamed_without_overwriting() {
    let db = legacy_catalog();
    set_component_params(
        &db,
        r#"{"user_login_code":1,"user_login_timeout":30,"user_client":1,"user_ip":1,"privacy_ip":0}"#,
    );
    let test = TestDependencies::new().with_database(db);

    let summary = run_step(&ComponentParamsStep, &test).await.unwrap();
    assert_eq!(summary.rows_updated, 1);

    let params = json_cell(&test.db.rows(EXTENSIONS_TABLE)[0], "params");
    assert_eq!(params["login_code"], json!(1));
    assert_eq!(params["login_code_timeout"], json!(30));
    assert_eq!(params["privancy_client"], json!(1));
    assert_eq!(params["user_ip"], json!(1));
    assert_eq!(params["privacy_ip"], json!(0));
    assert!(params.get("user_login_timeout").is_none());

    let again = run_step(&ComponentParamsStep, &test).await.unwrap();
    assert!(again.already_current);
    assert!(test
        .progress
        .notes()
        .contains(&"Params are up to date".to_string()));
}

#[tokio::test]
async fn missing_extension_is_reported_not_failed() {
    let db = legacy_catalog();
    db.create_table(
        EXTENSIONS_TABLE,
        &[("extension_id", "int(11)"), ("element", "varchar(100)"), ("params", "text")],
    );
    let test = TestDependencies::new().with_database(db);

    let summary = run_step(&ComponentParamsStep, &test).await.unwrap();

    assert!(summary.already_current);
    assert!(test
        .progress
        .notes()
        .contains(&"Extension com_radicalmart not found".to_string()));
}

#[tokio::test]
async fn menu_rewrite_defaults_layout_and_keeps_fragment() {
    let db = legacy_catalog();
    seed_menu_item(
        &db,
        7,
        "component",
        "index.php?option=com_radicalmart&view=categories#top",
    );
    seed_menu_item(
        &db,
        8,
        "url",
        "index.php?option=com_radicalmart&view=categories",
    );
    let test = TestDependencies::new().with_database(db).with_page_size(1);

    let summary = run_step(&MenuItemsStep, &test).await.unwrap();

    assert_eq!(summary.rows_updated, 1);
    let item = test.db.row(MENU_TABLE, 7).unwrap();
    assert_eq!(
        cell(&item, "link").as_text(),
        "index.php?option=com_radicalmart&view=category&layout=categories#top"
    );
    assert_eq!(
        json_cell(&item, "params")["view_categories_layout"],
        json!("categories")
    );
    assert_eq!(test.db.updated_ids(MENU_TABLE), vec![7]);
}

#[tokio::test]
async fn categories_without_rows_still_drop_legacy_totals() {
    let test = TestDependencies::new().with_database(legacy_catalog());

    let summary = run_step(&CategoriesStructureStep, &test).await.unwrap();

    assert!(!summary.already_current);
    assert!(test
        .progress
        .notes()
        .contains(&"Categories not found".to_string()));
    let columns = test.db.column_names(CATEGORIES_TABLE);
    assert!(columns.contains(&"totals".to_string()));
    assert!(!columns.contains(&"total_metas".to_string()));
    assert!(!test
        .db
        .index_names(CATEGORIES_TABLE)
        .contains(&"idx_total_metas".to_string()));
}

#[tokio::test]
async fn fieldsets_are_copied_before_the_legacy_column_goes() {
    let db = legacy_catalog();
    seed_field(&db, 1, "color", 4);
    seed_field(&db, 2, "size", 0);
    let test = TestDependencies::new().with_database(db);

    let summary = run_step(&FieldsStructureStep, &test).await.unwrap();

    assert_eq!(summary.rows_updated, 1);
    let first = test.db.row(FIELDS_TABLE, 1).unwrap();
    assert_eq!(cell(&first, "fieldset_site").as_int(), 4);
    assert_eq!(cell(&first, "fieldset_administrator").as_int(), 4);
    assert!(!test
        .db
        .index_names(FIELDS_TABLE)
        .contains(&"idx_fieldset".to_string()));
}

#[tokio::test]
async fn users_columns_skip_missing_columns() {
    // Legacy metas have no user columns yet
    let test = TestDependencies::new().with_database(legacy_catalog());

    let summary = run_step(&UsersColumnsStep, &test).await.unwrap();

    // created_by + modified_by on products and orders, index rename on both
    assert_eq!(summary.ddl_statements, 8);
    assert_eq!(
        test.db.column_type(PRODUCTS_TABLE, "modified_by").as_deref(),
        Some("int(10)")
    );
    assert!(test.db.column_type(METAS_TABLE, "created_by").is_none());
}

#[tokio::test]
async fn users_index_is_recreated_after_an_interrupted_rename() {
    // Legacy index already dropped, new one never added
    let db = MemoryDatabase::new();
    for table in [PRODUCTS_TABLE, METAS_TABLE, ORDERS_TABLE] {
        db.create_table(
            table,
            &[("id", "int(11)"), ("created_by", "int(10)"), ("modified_by", "int(10)")],
        );
    }
    let test = TestDependencies::new().with_database(db);

    let summary = run_step(&UsersColumnsStep, &test).await.unwrap();

    assert_eq!(summary.ddl_statements, 3);
    for table in [PRODUCTS_TABLE, METAS_TABLE, ORDERS_TABLE] {
        assert_eq!(test.db.index_names(table), vec!["idx_created_by".to_string()]);
    }

    let again = run_step(&UsersColumnsStep, &test).await.unwrap();
    assert!(again.already_current);
}

// =============================================================================
// Resave
// =============================================================================

#[tokio::test]
async fn rejected_save_stops_the_resave_with_every_message() {
    let db = legacy_catalog();
    seed_products(&db, 10);
    let test = TestDependencies::new()
        .with_database(db)
        .with_page_size(3)
        .with_domain(
            MockDomainModel::new()
                .with_ids(EntityKind::Product, 1..=10)
                .with_rejection(
                    EntityKind::Product,
                    7,
                    &["Alias already exists", "Price is required"],
                ),
        );

    let error = run_step(&ResaveStep::new(EntityKind::Product), &test)
        .await
        .unwrap_err();

    match error.root() {
        MigrationError::Save { kind, id, messages } => {
            assert_eq!(*kind, EntityKind::Product);
            assert_eq!(*id, 7);
            assert_eq!(messages.len(), 2);
        }
        other => panic!("unexpected error: {}", other),
    }
    let text = error.to_string();
    assert!(text.contains("Alias already exists"));
    assert!(text.contains("Price is required"));
    assert_eq!(
        test.domain.saved_ids(EntityKind::Product),
        (1..=7).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn resave_skips_rows_the_model_cannot_load() {
    let db = legacy_catalog();
    seed_products(&db, 4);
    let test = TestDependencies::new().with_database(db).with_domain(
        MockDomainModel::new().with_ids(EntityKind::Product, [1, 2, 4]),
    );

    run_step(&ResaveStep::new(EntityKind::Product), &test)
        .await
        .unwrap();

    assert_eq!(test.domain.saved_ids(EntityKind::Product), vec![1, 2, 4]);
}
