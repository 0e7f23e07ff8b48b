//! Storefront API library
//!
//! Catalog, user and guest carts, checkout and store administration over HTTP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod telemetry;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    handlers::AppServices,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        let db = Arc::new(db);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let services = AppServices::new(db.clone(), auth.clone());
        Self {
            db,
            config: Arc::new(config),
            auth,
            services,
        }
    }
}

/// JSON envelope for successful responses
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: telemetry::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Routes under `/api/v1`.
pub fn api_v1_routes(auth: Arc<AuthService>) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/products", get(handlers::products::list_products))
        .route("/products/:id", get(handlers::products::get_product))
        .route(
            "/products/:id/images",
            get(handlers::products::get_product_images),
        )
        .route("/categories", get(handlers::products::list_categories));

    // Signed-in users or guests identified by X-Session-ID
    let shopper = Router::new()
        .route(
            "/cart",
            post(handlers::carts::add_to_cart).get(handlers::carts::get_cart),
        )
        .route(
            "/cart/:product_id",
            put(handlers::carts::update_cart_item).delete(handlers::carts::remove_cart_item),
        )
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_my_orders),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route_layer(middleware::from_fn_with_state(
            auth.clone(),
            auth::optional_auth,
        ));

    let signed_in = Router::new()
        .route("/auth/profile", get(handlers::auth::profile))
        .route("/wallet", get(handlers::auth::wallet))
        .route("/cart/migrate", post(handlers::auth::migrate_cart))
        .route_layer(middleware::from_fn_with_state(
            auth.clone(),
            auth::require_auth,
        ));

    let admin = Router::new()
        .route(
            "/products",
            get(handlers::admin::list_products).post(handlers::admin::create_product),
        )
        .route(
            "/products/:id",
            put(handlers::admin::update_product).delete(handlers::admin::delete_product),
        )
        .route(
            "/products/:id/images",
            post(handlers::admin::add_product_image),
        )
        .route(
            "/images/:id",
            put(handlers::admin::update_product_image)
                .delete(handlers::admin::delete_product_image),
        )
        .route(
            "/categories",
            get(handlers::admin::list_categories).post(handlers::admin::create_category),
        )
        .route(
            "/categories/:id",
            put(handlers::admin::update_category).delete(handlers::admin::delete_category),
        )
        .route("/orders", get(handlers::admin::list_orders))
        .route("/orders/:id", get(handlers::admin::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::admin::update_order_status),
        )
        .route("/customers", get(handlers::admin::list_customers))
        .route("/users/:id/wallet", post(handlers::admin::adjust_wallet))
        .route_layer(middleware::from_fn(auth::require_admin))
        .route_layer(middleware::from_fn_with_state(auth, auth::require_auth));

    public
        .merge(shopper)
        .merge(signed_in)
        .nest("/admin", admin)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(common::SESSION_HEADER),
            HeaderName::from_static(middleware_helpers::REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(
            middleware_helpers::REQUEST_ID_HEADER,
        )])
}

/// Full application router with cross-cutting layers applied.
pub fn app_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api_v1_routes(state.auth.clone()))
        .merge(openapi::swagger_ui())
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http().make_span_with(telemetry::RequestSpanMaker))
        .layer(middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}
