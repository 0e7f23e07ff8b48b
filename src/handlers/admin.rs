//! Admin-only catalog, order and customer management.
//!
//! Every route here sits behind `require_auth` and `require_admin`.

use crate::{
    entities::{category, order, product, product_image, OrderStatus},
    errors::ApiError,
    handlers::{
        common::{
            created_response, no_content_response, success_response, validate_input,
            PaginatedResponse, PaginationParams,
        },
        products::{product_page, ProductQuery},
    },
    services::{
        catalog::{
            CategoryPatch, NewCategory, NewProduct, NewProductImage, ProductImagePatch,
            ProductPatch,
        },
        orders::{OrderStatusPatch, OrderWithItems},
        users::UserProfile,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteProductQuery {
    /// Remove the row instead of deactivating it
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WalletAdjustment {
    /// Positive to credit, negative to debit
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletBalance {
    pub user_id: Uuid,
    pub balance: Decimal,
}

// Products

#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    tag = "admin",
    params(ProductQuery),
    responses((status = 200, description = "All products including inactive", body = ApiResponse<PaginatedResponse<product::Model>>)),
    security(("Bearer" = []))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Response, ApiError> {
    Ok(success_response(product_page(&state, query, true).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    tag = "admin",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<product::Model>),
        (status = 400, description = "Invalid product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let product = state.services.catalog.create_product(input).await?;
    Ok(created_response(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    tag = "admin",
    request_body = ProductPatch,
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<product::Model>),
        (status = 400, description = "No fields to update", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> Result<Response, ApiError> {
    validate_input(&patch)?;
    let product = state
        .services
        .catalog
        .update_product(product_id, patch)
        .await?;
    Ok(success_response(product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Product id"), DeleteProductQuery),
    responses(
        (status = 204, description = "Product deactivated or deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product used in existing orders", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<DeleteProductQuery>,
) -> Result<Response, ApiError> {
    state
        .services
        .catalog
        .delete_product(product_id, query.hard)
        .await?;
    Ok(no_content_response())
}

// Images

pub async fn add_product_image(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<NewProductImage>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let image: product_image::Model = state
        .services
        .catalog
        .add_product_image(product_id, input)
        .await?;
    Ok(created_response(image))
}

pub async fn update_product_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
    Json(patch): Json<ProductImagePatch>,
) -> Result<Response, ApiError> {
    validate_input(&patch)?;
    let image = state
        .services
        .catalog
        .update_product_image(image_id, patch)
        .await?;
    Ok(success_response(image))
}

pub async fn delete_product_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.catalog.delete_product_image(image_id).await?;
    Ok(no_content_response())
}

// Categories

#[utoipa::path(
    get,
    path = "/api/v1/admin/categories",
    tag = "admin",
    responses((status = 200, description = "All categories including inactive", body = ApiResponse<Vec<category::Model>>)),
    security(("Bearer" = []))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Response, ApiError> {
    let categories = state.services.catalog.list_categories(true).await?;
    Ok(success_response(categories))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/categories",
    tag = "admin",
    request_body = NewCategory,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<category::Model>),
        (status = 409, description = "Slug already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<NewCategory>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let category = state.services.catalog.create_category(input).await?;
    Ok(created_response(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Response, ApiError> {
    validate_input(&patch)?;
    let category = state
        .services
        .catalog
        .update_category(category_id, patch)
        .await?;
    Ok(success_response(category))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/categories/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Category id")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 409, description = "Category still has products or subcategories", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.catalog.delete_category(category_id).await?;
    Ok(no_content_response())
}

// Orders

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    tag = "admin",
    params(AdminOrderQuery),
    responses((status = 200, description = "Orders, newest first", body = ApiResponse<PaginatedResponse<order::Model>>)),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<AdminOrderQuery>,
) -> Result<Response, ApiError> {
    let defaults = PaginationParams::default();
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(defaults.page),
        per_page: query.per_page.unwrap_or(defaults.per_page),
    }
    .normalized();

    let (orders, total) = state
        .services
        .orders
        .list_orders(query.status, page, per_page)
        .await?;
    Ok(success_response(PaginatedResponse::new(
        orders, page, per_page, total,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/orders/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state.services.orders.get_order(order_id).await?;
    Ok(success_response(order))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    tag = "admin",
    request_body = OrderStatusPatch,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<order::Model>),
        (status = 400, description = "Empty patch or illegal transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(patch): Json<OrderStatusPatch>,
) -> Result<Response, ApiError> {
    validate_input(&patch)?;
    let order = state
        .services
        .orders
        .update_order_status(order_id, patch)
        .await?;
    Ok(success_response(order))
}

// Customers

#[utoipa::path(
    get,
    path = "/api/v1/admin/customers",
    tag = "admin",
    responses((status = 200, description = "Customer accounts", body = ApiResponse<Vec<UserProfile>>)),
    security(("Bearer" = []))
)]
pub async fn list_customers(State(state): State<AppState>) -> Result<Response, ApiError> {
    let customers = state.services.users.list_customers().await?;
    Ok(success_response(customers))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{id}/wallet",
    tag = "admin",
    request_body = WalletAdjustment,
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "New balance", body = ApiResponse<WalletBalance>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Balance would go negative", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn adjust_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(adjustment): Json<WalletAdjustment>,
) -> Result<Response, ApiError> {
    if adjustment.amount.is_zero() {
        return Err(ApiError::validation("amount must not be zero"));
    }
    let balance = state
        .services
        .users
        .adjust_wallet(user_id, adjustment.amount)
        .await?;
    info!(%user_id, amount = %adjustment.amount, "admin wallet adjustment");
    Ok(success_response(WalletBalance { user_id, balance }))
}
