//! Catalog actions over the in-memory store: writes, cascade and caching.

#![allow(clippy::unwrap_used)]

use savers_core::CategoryId;
use savers_integration_tests::{TestContext, product_draft};
use savers_site::actions::{ActionError, CategoryForm};

// =============================================================================
// Categories
// =============================================================================

#[tokio::test]
async fn test_created_category_listed_once() {
    let ctx = TestContext::new();
    let id = ctx.category("Safes").await;

    let listed = ctx.state.categories().list().await.unwrap();
    assert_eq!(listed.iter().filter(|c| c.id == id).count(), 1);
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_duplicate_category_name_rejected() {
    let ctx = TestContext::new();
    ctx.category("Safes").await;

    let result = ctx
        .state
        .categories()
        .create(&CategoryForm {
            name: "Safes".to_owned(),
            image: "https://storage.test/images/other.png".to_owned(),
        })
        .await;

    assert!(matches!(result, Err(ActionError::Conflict(_))));
    assert_eq!(ctx.state.categories().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_category_rejected_before_store() {
    let ctx = TestContext::new();
    let result = ctx
        .state
        .categories()
        .create(&CategoryForm {
            name: "   ".to_owned(),
            image: String::new(),
        })
        .await;

    assert!(matches!(result, Err(ActionError::Validation(_))));
    assert_eq!(ctx.store.catalog_reads(), 0);
}

#[tokio::test]
async fn test_deleting_category_removes_its_products() {
    let ctx = TestContext::new();
    let safes = ctx.category("Safes").await;
    let lockers = ctx.category("Lockers").await;
    let fire_safe = ctx.product(safes, "Fire Safe 120").await;
    ctx.product(safes, "Home Safe 40").await;
    ctx.product(lockers, "Deposit Locker").await;
    assert!(ctx.state.products().get(fire_safe).await.unwrap().is_some());

    ctx.state.categories().delete(safes).await.unwrap();

    assert!(ctx.state.products().get(fire_safe).await.unwrap().is_none());
    let products = ctx.state.products().list().await.unwrap();
    assert_eq!(products.len(), 1);
    assert!(products.iter().all(|p| p.category_id == lockers));
    assert!(ctx.state.categories().get(safes).await.unwrap().is_none());
}

#[tokio::test]
async fn test_batch_delete_reports_each_id() {
    let ctx = TestContext::new();
    let safes = ctx.category("Safes").await;
    let lockers = ctx.category("Lockers").await;
    let missing = CategoryId::new(9_999);

    let results = ctx
        .state
        .categories()
        .delete_many(&[safes, missing, lockers])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results.iter().find(|r| r.id == safes).unwrap().success);
    assert!(results.iter().find(|r| r.id == lockers).unwrap().success);
    let failed = results.iter().find(|r| r.id == missing).unwrap();
    assert!(!failed.success);
    assert!(failed.error.is_some());
    assert!(ctx.state.categories().list().await.unwrap().is_empty());
}

// =============================================================================
// Products
// =============================================================================

#[tokio::test]
async fn test_product_requires_existing_category() {
    let ctx = TestContext::new();
    let result = ctx
        .state
        .products()
        .create(&product_draft(CategoryId::new(42), "Orphan"))
        .await;

    assert!(matches!(result, Err(ActionError::Validation(_))));
}

#[tokio::test]
async fn test_products_filtered_by_category() {
    let ctx = TestContext::new();
    let safes = ctx.category("Safes").await;
    let lockers = ctx.category("Lockers").await;
    ctx.product(safes, "Fire Safe 120").await;
    ctx.product(lockers, "Deposit Locker").await;

    let in_safes = ctx.state.products().list_by_category(safes).await.unwrap();
    assert_eq!(in_safes.len(), 1);
    assert_eq!(in_safes.first().unwrap().name, "Fire Safe 120");
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn test_repeated_reads_served_from_cache() {
    let ctx = TestContext::new();
    ctx.category("Safes").await;
    let before = ctx.store.catalog_reads();

    ctx.state.categories().list().await.unwrap();
    ctx.state.categories().list().await.unwrap();
    ctx.state.categories().list().await.unwrap();

    assert_eq!(ctx.store.catalog_reads(), before + 1);
}

#[tokio::test]
async fn test_write_invalidates_cached_list() {
    let ctx = TestContext::new();
    let safes = ctx.category("Safes").await;
    assert_eq!(ctx.state.products().list().await.unwrap().len(), 0);

    ctx.product(safes, "Fire Safe 120").await;

    let products = ctx.state.products().list().await.unwrap();
    assert_eq!(products.len(), 1);
}

#[tokio::test]
async fn test_category_rename_visible_immediately() {
    let ctx = TestContext::new();
    let id = ctx.category("Safes").await;
    ctx.state.categories().get(id).await.unwrap();

    ctx.state
        .categories()
        .update(
            id,
            &CategoryForm {
                name: "Fire Safes".to_owned(),
                image: "https://storage.test/images/safes.png".to_owned(),
            },
        )
        .await
        .unwrap();

    let category = ctx.state.categories().get(id).await.unwrap().unwrap();
    assert_eq!(category.name, "Fire Safes");
}

#[tokio::test]
async fn test_store_failure_surfaces_as_storage_error() {
    let ctx = TestContext::new();
    ctx.store.set_failing(true);

    let result = ctx.state.categories().list().await;
    assert!(matches!(result, Err(ActionError::Storage(_))));
    assert_eq!(
        result.unwrap_err().user_message(),
        "Something went wrong. Please try again."
    );
}
