//! HTTP surface: routing, identity resolution and status codes.

mod common;

use axum::http::{Method, StatusCode};
use common::{bearer, decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

const SESSION: (&str, &str) = ("X-Session-ID", "guest-http-1");

#[tokio::test]
async fn health_reports_database() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::GET,
            "/api/v1/categories",
            None,
            &[("x-request-id", "req-echo-42")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-echo-42"
    );
}

#[tokio::test]
async fn guest_cart_round_trip() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "product_id": tee.id, "quantity": 2 })),
            &[SESSION],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total_items"], 2);

    let response = app.request(Method::GET, "/api/v1/cart", None, &[SESSION]).await;
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(decimal(&body["data"]["subtotal"]), dec!(200));
    assert_eq!(body["data"]["items"][0]["slug"], "tee");
}

#[tokio::test]
async fn cart_without_identity_is_rejected() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/cart", None, &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_quantity_is_rejected() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;
    let max = app.state.config.max_cart_quantity;

    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "product_id": tee.id, "quantity": max + 1 })),
            &[SESSION],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/cart",
            Some(json!({ "product_id": uuid::Uuid::new_v4() })),
            &[SESSION],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guest_checkout_empties_cart() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;

    app.request(
        Method::POST,
        "/api/v1/cart",
        Some(json!({ "product_id": tee.id, "quantity": 3 })),
        &[SESSION],
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "shipping_address": "1 Main St" })),
            &[SESSION],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(300));
    assert_eq!(body["data"]["status"], "pending");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app.request(Method::GET, "/api/v1/cart", None, &[SESSION]).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total_items"], 0);

    let uri = format!("/api/v1/orders/{}", order_id);
    let response = app.request(Method::GET, &uri, None, &[SESSION]).await;
    assert_eq!(response.status(), StatusCode::OK);

    // another guest cannot see it
    let response = app
        .request(Method::GET, &uri, None, &[("X-Session-ID", "someone-else")])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_cart_checkout_is_bad_request() {
    let app = TestApp::new().await;
    let response = app.request(Method::POST, "/api/v1/orders", None, &[SESSION]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registering_with_session_adopts_guest_cart() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;

    app.request(
        Method::POST,
        "/api/v1/cart",
        Some(json!({ "product_id": tee.id, "quantity": 2 })),
        &[SESSION],
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "username": "newbie",
                "email": "newbie@example.com",
                "password": "secret-pass"
            })),
            &[SESSION],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let token = body["data"]["token"]["access_token"].as_str().unwrap();
    let auth = format!("Bearer {}", token);

    let response = app
        .request(Method::GET, "/api/v1/cart", None, &[("Authorization", &auth)])
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total_items"], 2);

    let response = app.request(Method::GET, "/api/v1/cart", None, &[SESSION]).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total_items"], 0);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    app.register_customer("ada").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "ada@example.com", "password": "wrong-pass" })),
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_requires_token() {
    let app = TestApp::new().await;
    let user = app.register_customer("ada").await;

    let response = app.request(Method::GET, "/api/v1/auth/profile", None, &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let auth = bearer(&user);
    let response = app
        .request(Method::GET, "/api/v1/auth/profile", None, &[("Authorization", &auth)])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["username"], "ada");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn admin_routes_check_role() {
    let app = TestApp::new().await;
    let customer = app.register_customer("ada").await;
    let admin = app.register_admin("root").await;
    let payload = json!({ "name": "Shoes", "slug": "shoes", "sort_order": 0 });

    let response = app
        .request(Method::POST, "/api/v1/admin/categories", Some(payload.clone()), &[])
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let auth = bearer(&customer);
    let response = app
        .request(
            Method::POST,
            "/api/v1/admin/categories",
            Some(payload.clone()),
            &[("Authorization", &auth)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let auth = bearer(&admin);
    let response = app
        .request(
            Method::POST,
            "/api/v1/admin/categories",
            Some(payload),
            &[("Authorization", &auth)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["slug"], "shoes");
}

#[tokio::test]
async fn admin_status_update_rejects_invalid_transition() {
    let app = TestApp::new().await;
    let cat = app.seed_category("apparel").await;
    let tee = app.seed_product(cat.id, "tee", dec!(100)).await;
    let admin = app.register_admin("root").await;
    let auth = bearer(&admin);

    app.request(
        Method::POST,
        "/api/v1/cart",
        Some(json!({ "product_id": tee.id })),
        &[SESSION],
    )
    .await;
    let body = response_json(app.request(Method::POST, "/api/v1/orders", None, &[SESSION]).await).await;
    let uri = format!("/api/v1/admin/orders/{}/status", body["data"]["id"].as_str().unwrap());

    let response = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "status": "delivered" })),
            &[("Authorization", &auth)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::PUT,
            &uri,
            Some(json!({ "status": "confirmed" })),
            &[("Authorization", &auth)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "confirmed");
}
