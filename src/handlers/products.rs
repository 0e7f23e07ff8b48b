use crate::{
    entities::{category, product, product_image},
    errors::ApiError,
    handlers::common::{success_response, PaginatedResponse, PaginationParams},
    services::catalog::{ProductDetail, ProductFilter},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Query string for product listings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    pub category_id: Option<Uuid>,
    pub featured: Option<bool>,
    /// Case-sensitive substring of the product name
    pub search: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ProductQuery {
    pub fn split(self, include_inactive: bool) -> (ProductFilter, PaginationParams) {
        let defaults = PaginationParams::default();
        let pagination = PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        };
        let filter = ProductFilter {
            category_id: self.category_id,
            featured: self.featured,
            search: self.search,
            include_inactive,
        };
        (filter, pagination)
    }
}

pub(crate) async fn product_page(
    state: &AppState,
    query: ProductQuery,
    include_inactive: bool,
) -> Result<PaginatedResponse<product::Model>, ApiError> {
    let (filter, pagination) = query.split(include_inactive);
    let (page, per_page) = pagination.normalized();
    let (items, total) = state
        .services
        .catalog
        .list_products(filter, page, per_page)
        .await?;
    Ok(PaginatedResponse::new(items, page, per_page, total))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "catalog",
    params(ProductQuery),
    responses((status = 200, description = "Active products, newest first", body = ApiResponse<PaginatedResponse<product::Model>>))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Response, ApiError> {
    Ok(success_response(product_page(&state, query, false).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with images", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product not found or inactive", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let detail = state.services.catalog.get_product_detail(product_id).await?;
    Ok(success_response(detail))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/images",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Images in display order", body = ApiResponse<Vec<product_image::Model>>))
)]
pub async fn get_product_images(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let images = state.services.catalog.list_product_images(product_id).await?;
    Ok(success_response(images))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "catalog",
    responses((status = 200, description = "Active categories", body = ApiResponse<Vec<category::Model>>))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Response, ApiError> {
    let categories = state.services.catalog.list_categories(false).await?;
    Ok(success_response(categories))
}
