//! Checkout from cart and admin order handling.

mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use rstest::rstest;
use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_api::{
    common::Owner,
    entities::{order, order_item, OrderStatus, PaymentStatus},
    errors::ServiceError,
    services::orders::{CheckoutDetails, OrderStatusPatch},
};

async fn order_count(app: &TestApp) -> u64 {
    order::Entity::find().count(&*app.state.db).await.unwrap()
}

#[tokio::test]
async fn empty_cart_creates_nothing() {
    let app = TestApp::new().await;
    let owner = Owner::Guest("sess-empty".into());

    let err = app
        .orders()
        .create_order_from_cart(&owner, CheckoutDetails::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::EmptyCart);
    assert_eq!(order_count(&app).await, 0);
    assert_eq!(
        order_item::Entity::find().count(&*app.state.db).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn checkout_snapshots_cart_and_clears_it() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let a = app.seed_product(cat.id, "product-a", dec!(100)).await;
    let b = app.seed_product(cat.id, "product-b", dec!(50)).await;
    let user = app.register_customer("buyer").await;
    let owner = Owner::User(user.user.id);

    app.cart().add_item(&owner, a.id, 2).await.unwrap();
    app.cart().add_item(&owner, b.id, 1).await.unwrap();

    let before = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(before.total_items, 3);
    assert_eq!(before.subtotal, dec!(250));

    let created = app
        .orders()
        .create_order_from_cart(
            &owner,
            CheckoutDetails {
                shipping_address: Some("1 Main St".into()),
                payment_method: Some("card".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(created.order.total_amount, dec!(250));
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert_eq!(created.order.payment_status, PaymentStatus::Pending);
    assert_eq!(created.order.user_id, Some(user.user.id));
    assert!(created.order.session_id.is_none());
    assert!(created.order.order_number.starts_with("ORD-"));
    assert_eq!(created.items.len(), 2);

    let line_total: Decimal = created.items.iter().map(|i| i.total_price).sum();
    assert_eq!(line_total, dec!(250));
    let line_a = created
        .items
        .iter()
        .find(|i| i.product_id == a.id)
        .unwrap();
    assert_eq!(line_a.quantity, 2);
    assert_eq!(line_a.product_sku, "SKU-PRODUCT-A");

    let after = app.cart().summarize(&owner).await.unwrap();
    assert_eq!(after.total_items, 0);
    assert_eq!(after.subtotal, Decimal::ZERO);

    // A second checkout sees an empty cart
    let err = app
        .orders()
        .create_order_from_cart(&owner, CheckoutDetails::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::EmptyCart);
    assert_eq!(order_count(&app).await, 1);
}

#[tokio::test]
async fn order_lines_are_frozen_against_price_changes() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let a = app.seed_product(cat.id, "product-a", dec!(100)).await;
    let owner = Owner::Guest("sess-frozen".into());

    app.cart().add_item(&owner, a.id, 1).await.unwrap();
    let created = app
        .orders()
        .create_order_from_cart(&owner, CheckoutDetails::default())
        .await
        .unwrap();

    app.catalog()
        .update_product(
            a.id,
            storefront_api::services::catalog::ProductPatch {
                base_price: Some(dec!(50)),
                name: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let reloaded = app.orders().get_order(created.order.id).await.unwrap();
    assert_eq!(reloaded.items[0].unit_price, dec!(100));
    assert_eq!(reloaded.items[0].product_name, "Product product-a");
    assert_eq!(reloaded.order.total_amount, dec!(100));
}

#[tokio::test]
async fn inactive_only_cart_counts_as_empty() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let a = app.seed_product(cat.id, "product-a", dec!(100)).await;
    let owner = Owner::Guest("sess-inactive".into());

    app.cart().add_item(&owner, a.id, 1).await.unwrap();
    app.catalog().delete_product(a.id, false).await.unwrap();

    let err = app
        .orders()
        .create_order_from_cart(&owner, CheckoutDetails::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::EmptyCart);
    assert_eq!(order_count(&app).await, 0);
}

#[tokio::test]
async fn guest_orders_are_listed_by_session() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let a = app.seed_product(cat.id, "product-a", dec!(100)).await;
    let owner = Owner::Guest("sess-history".into());

    for _ in 0..2 {
        app.cart().add_item(&owner, a.id, 1).await.unwrap();
        app.orders()
            .create_order_from_cart(&owner, CheckoutDetails::default())
            .await
            .unwrap();
    }

    let orders = app.orders().get_owner_orders(&owner).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.items.len() == 1));
    assert!(orders
        .iter()
        .all(|o| o.order.session_id.as_deref() == Some("sess-history")));

    let other = Owner::Guest("sess-other".into());
    assert!(app.orders().get_owner_orders(&other).await.unwrap().is_empty());

    let (page, total) = app.orders().list_orders(Some(OrderStatus::Pending), 1, 10).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(page.len(), 2);
}

#[tokio::test]
async fn get_missing_order_is_not_found() {
    let app = TestApp::new().await;
    let err = app.orders().get_order(uuid::Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

async fn placed_order(app: &TestApp) -> order::Model {
    let cat = app.seed_category("apparel").await;
    let a = app.seed_product(cat.id, "product-a", dec!(100)).await;
    let owner = Owner::Guest("sess-status".into());
    app.cart().add_item(&owner, a.id, 1).await.unwrap();
    app.orders()
        .create_order_from_cart(&owner, CheckoutDetails::default())
        .await
        .unwrap()
        .order
}

#[tokio::test]
async fn empty_status_patch_is_rejected() {
    let app = TestApp::new().await;
    let order = placed_order(&app).await;

    let err = app
        .orders()
        .update_order_status(order.id, OrderStatusPatch::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NoFieldsToUpdate);
}

#[rstest]
#[case(OrderStatus::Confirmed, true)]
#[case(OrderStatus::Cancelled, true)]
#[case(OrderStatus::Pending, true)]
#[case(OrderStatus::Shipped, false)]
#[case(OrderStatus::Delivered, false)]
#[tokio::test]
async fn status_changes_from_pending(#[case] next: OrderStatus, #[case] allowed: bool) {
    let app = TestApp::new().await;
    let order = placed_order(&app).await;

    let result = app
        .orders()
        .update_order_status(
            order.id,
            OrderStatusPatch {
                status: Some(next),
                ..Default::default()
            },
        )
        .await;

    if allowed {
        assert_eq!(result.unwrap().status, next);
    } else {
        assert_matches!(result, Err(ServiceError::InvalidStatusTransition(_)));
    }
}

#[tokio::test]
async fn payment_fields_update_without_status() {
    let app = TestApp::new().await;
    let order = placed_order(&app).await;

    let updated = app
        .orders()
        .update_order_status(
            order.id,
            OrderStatusPatch {
                payment_status: Some(PaymentStatus::Paid),
                payment_method: Some("wallet".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.payment_status, PaymentStatus::Paid);
    assert_eq!(updated.payment_method.as_deref(), Some("wallet"));
    assert_eq!(updated.status, OrderStatus::Pending);
}
