//! Cart engine behavior against a real database.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_api::{
    common::Owner,
    errors::ServiceError,
    services::catalog::ProductPatch,
};
use uuid::Uuid;

fn guest(session: &str) -> Owner {
    Owner::Guest(session.to_string())
}

#[tokio::test]
async fn repeated_adds_accumulate_into_one_row() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(12.50)).await;
    let owner = guest("sess-acc");

    app.cart().add_item(&owner, tee.id, 2).await.unwrap();
    app.cart().add_item(&owner, tee.id, 3).await.unwrap();

    let summary = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(summary.items.len(), 1);
    assert_eq!(summary.items[0].quantity, 5);
    assert_eq!(summary.total_items, 5);
    assert_eq!(summary.subtotal, dec!(62.50));
}

#[tokio::test]
async fn non_positive_add_counts_as_one() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;
    let owner = guest("sess-default");

    app.cart().add_item(&owner, tee.id, 0).await.unwrap();
    app.cart().add_item(&owner, tee.id, -4).await.unwrap();

    let summary = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(summary.items[0].quantity, 2);
}

#[tokio::test]
async fn adding_unknown_or_inactive_product_fails() {
    let app = TestApp::new().await;
    let owner = guest("sess-missing");

    let err = app.cart().add_item(&owner, Uuid::new_v4(), 1).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;
    app.catalog().delete_product(tee.id, false).await.unwrap();
    let err = app.cart().add_item(&owner, tee.id, 1).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn update_overwrites_and_zero_removes() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;
    let user = app.register_customer("shopper").await;
    let owner = Owner::User(user.user.id);

    app.cart().add_item(&owner, tee.id, 4).await.unwrap();
    app.cart().update_quantity(&owner, tee.id, 7).await.unwrap();
    let summary = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(summary.items[0].quantity, 7);

    app.cart().update_quantity(&owner, tee.id, 0).await.unwrap();
    let summary = app.cart().summarize(&owner).await.unwrap();
    assert!(summary.is_empty());

    // absent row: still fine
    app.cart().update_quantity(&owner, tee.id, 0).await.unwrap();
    app.cart().remove_item(&owner, tee.id).await.unwrap();
}

#[tokio::test]
async fn carts_are_isolated_per_owner() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;

    app.cart().add_item(&guest("a"), tee.id, 1).await.unwrap();
    app.cart().add_item(&guest("b"), tee.id, 2).await.unwrap();

    assert_eq!(app.cart().summarize(&guest("a")).await.unwrap().total_items, 1);
    assert_eq!(app.cart().summarize(&guest("b")).await.unwrap().total_items, 2);

    app.cart().remove_item(&guest("a"), tee.id).await.unwrap();
    assert!(app.cart().summarize(&guest("a")).await.unwrap().is_empty());
    assert_eq!(app.cart().summarize(&guest("b")).await.unwrap().total_items, 2);
}

#[tokio::test]
async fn deactivated_products_are_hidden_then_restored() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let a = app.seed_product(cat.id, "product-a", dec!(100)).await;
    let b = app.seed_product(cat.id, "product-b", dec!(50)).await;
    let owner = guest("sess-hide");

    app.cart().add_item(&owner, a.id, 2).await.unwrap();
    app.cart().add_item(&owner, b.id, 1).await.unwrap();

    app.catalog().delete_product(b.id, false).await.unwrap();
    let summary = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(summary.items.len(), 1);
    assert_eq!(summary.subtotal, dec!(200));

    app.catalog()
        .update_product(
            b.id,
            ProductPatch {
                is_active: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let summary = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(summary.items.len(), 2);
    assert_eq!(summary.subtotal, dec!(250));
}

#[tokio::test]
async fn summary_reflects_current_price() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;
    let owner = guest("sess-price");

    app.cart().add_item(&owner, tee.id, 2).await.unwrap();
    app.catalog()
        .update_product(
            tee.id,
            ProductPatch {
                base_price: Some(dec!(50)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let summary = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(summary.subtotal, dec!(100));
}

#[tokio::test]
async fn guest_cart_merges_into_user_cart_once() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let a = app.seed_product(cat.id, "product-a", dec!(100)).await;
    let b = app.seed_product(cat.id, "product-b", dec!(50)).await;
    let user = app.register_customer("merger").await;
    let user_owner = Owner::User(user.user.id);
    let session = "sess-merge";

    app.cart().add_item(&user_owner, a.id, 1).await.unwrap();
    app.cart().add_item(&guest(session), a.id, 2).await.unwrap();
    app.cart().add_item(&guest(session), b.id, 1).await.unwrap();

    let moved = app
        .cart()
        .migrate_guest_to_user(session, user.user.id)
        .await
        .unwrap();
    assert_eq!(moved, 2);

    let summary = app.cart().summarize(&user_owner).await.unwrap();
    let qty_a = summary
        .items
        .iter()
        .find(|line| line.product_id == a.id)
        .map(|line| line.quantity);
    assert_eq!(qty_a, Some(3));
    assert_eq!(summary.total_items, 4);
    assert!(app.cart().summarize(&guest(session)).await.unwrap().is_empty());

    let moved_again = app
        .cart()
        .migrate_guest_to_user(session, user.user.id)
        .await
        .unwrap();
    assert_eq!(moved_again, 0);
    let summary = app.cart().summarize(&user_owner).await.unwrap();
    assert_eq!(summary.total_items, 4);
    assert_eq!(summary.subtotal, Decimal::from(350));
}

#[tokio::test]
async fn concurrent_adds_are_not_lost() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;
    let owner = guest("sess-race");
    let cart = app.cart();

    let (a, b, c) = tokio::join!(
        cart.add_item(&owner, tee.id, 1),
        cart.add_item(&owner, tee.id, 2),
        cart.add_item(&owner, tee.id, 3),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let summary = cart.summarize(&owner).await.unwrap();
    assert_eq!(summary.items.len(), 1);
    assert_eq!(summary.items[0].quantity, 6);
    assert_eq!(summary.subtotal, dec!(600));
}
