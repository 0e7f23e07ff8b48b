pub mod admin;
pub mod auth;
pub mod carts;
pub mod common;
pub mod health;
pub mod orders;
pub mod products;

use crate::{
    auth::AuthService,
    db::DbPool,
    services::{CartService, CatalogService, OrderService, UserService},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, auth_service: Arc<AuthService>) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            cart: Arc::new(CartService::new(db_pool.clone())),
            orders: Arc::new(OrderService::new(db_pool.clone())),
            users: Arc::new(UserService::new(db_pool, auth_service)),
        }
    }
}
