use crate::{
    common::Owner,
    errors::ApiError,
    handlers::common::{message_response, success_response},
    services::cart::CartSummary,
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    /// Defaults to 1
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// 0 removes the item
    pub quantity: i32,
}

fn check_quantity(quantity: i32, min: i32, max: i32) -> Result<(), ApiError> {
    if quantity < min || quantity > max {
        return Err(ApiError::validation(format!(
            "quantity must be between {} and {}",
            min, max
        )));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/cart",
    tag = "cart",
    request_body = AddToCartRequest,
    params(("X-Session-ID" = Option<String>, Header, description = "Guest session when not signed in")),
    responses(
        (status = 200, description = "Item added; returns the updated cart", body = ApiResponse<CartSummary>),
        (status = 400, description = "Invalid quantity or missing session", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    owner: Owner,
    Json(request): Json<AddToCartRequest>,
) -> Result<Response, ApiError> {
    let quantity = request.quantity.unwrap_or(1);
    check_quantity(quantity, 1, state.config.max_cart_quantity)?;

    let cart = &state.services.cart;
    cart.add_item(&owner, request.product_id, quantity).await?;
    Ok(success_response(cart.summarize(&owner).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    tag = "cart",
    params(("X-Session-ID" = Option<String>, Header, description = "Guest session when not signed in")),
    responses(
        (status = 200, description = "Current cart", body = ApiResponse<CartSummary>),
        (status = 400, description = "Missing session", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_cart(State(state): State<AppState>, owner: Owner) -> Result<Response, ApiError> {
    let summary = state.services.cart.summarize(&owner).await?;
    Ok(success_response(summary))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/{product_id}",
    tag = "cart",
    request_body = UpdateCartItemRequest,
    params(
        ("product_id" = Uuid, Path, description = "Product in the cart"),
        ("X-Session-ID" = Option<String>, Header, description = "Guest session when not signed in"),
    ),
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartSummary>),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    owner: Owner,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Response, ApiError> {
    check_quantity(request.quantity, 0, state.config.max_cart_quantity)?;

    let cart = &state.services.cart;
    cart.update_quantity(&owner, product_id, request.quantity)
        .await?;
    Ok(success_response(cart.summarize(&owner).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/{product_id}",
    tag = "cart",
    params(
        ("product_id" = Uuid, Path, description = "Product to remove"),
        ("X-Session-ID" = Option<String>, Header, description = "Guest session when not signed in"),
    ),
    responses((status = 200, description = "Item removed"))
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    owner: Owner,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.cart.remove_item(&owner, product_id).await?;
    Ok(message_response("Item removed from cart"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_bounds() {
        assert!(check_quantity(1, 1, 100).is_ok());
        assert!(check_quantity(100, 1, 100).is_ok());
        assert!(check_quantity(0, 1, 100).is_err());
        assert!(check_quantity(101, 1, 100).is_err());
        assert!(check_quantity(0, 0, 100).is_ok());
        assert!(check_quantity(-1, 0, 100).is_err());
    }
}
