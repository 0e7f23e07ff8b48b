#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_api::{
    app_router,
    config::AppConfig,
    db,
    entities::{category, product, UserRole},
    services::{
        users::{AuthSession, RegisterRequest},
        CartService, CatalogService, OrderService, UserService,
    },
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "k9Qz7Lr2Vx4Bn8Wm1Tc6Yh3Jd5Fs0Pa-integration-signing-key";

/// Application wired against a private in-memory SQLite database.
///
/// The pool holds exactly one connection so every query sees the same
/// in-memory database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(pool, cfg);
        let router = app_router(state.clone());
        Self { router, state }
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.state.services.catalog
    }

    pub fn cart(&self) -> &CartService {
        &self.state.services.cart
    }

    pub fn orders(&self) -> &OrderService {
        &self.state.services.orders
    }

    pub fn users(&self) -> &UserService {
        &self.state.services.users
    }

    pub async fn seed_category(&self, slug: &str) -> category::Model {
        let now = Utc::now();
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(slug.to_string()),
            slug: Set(slug.to_string()),
            description: Set(None),
            parent_id: Set(None),
            image_url: Set(None),
            sort_order: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed category")
    }

    pub async fn seed_product(
        &self,
        category_id: Uuid,
        slug: &str,
        price: Decimal,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Product {}", slug)),
            slug: Set(slug.to_string()),
            description: Set(None),
            short_description: Set(None),
            category_id: Set(category_id),
            base_price: Set(price),
            is_active: Set(true),
            is_featured: Set(false),
            weight: Set(None),
            dimensions: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "secret-pass".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
        }
    }

    pub async fn register_customer(&self, username: &str) -> AuthSession {
        self.users()
            .register(Self::register_request(username))
            .await
            .expect("register customer")
    }

    pub async fn register_admin(&self, username: &str) -> AuthSession {
        self.users()
            .create_user(Self::register_request(username), UserRole::Admin)
            .await
            .expect("register admin")
    }

    /// Sends a request through the full router, layers included.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router is infallible")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn bearer(session: &AuthSession) -> String {
    format!("Bearer {}", session.token.access_token)
}

/// Reads a decimal that rust_decimal serialized as a JSON string.
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal serialized as string")
        .parse()
        .expect("valid decimal")
}
