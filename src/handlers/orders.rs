use crate::{
    auth::{AuthUser, GuestSession},
    common::Owner,
    errors::{ApiError, ServiceError},
    handlers::common::{created_response, success_response, validate_input},
    services::orders::{CheckoutDetails, OrderWithItems},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

/// Who may read an order: its owner or an admin.
fn can_view(order: &OrderWithItems, user: Option<&AuthUser>, session: Option<&str>) -> bool {
    match user {
        Some(user) if user.is_admin() => true,
        Some(user) => order.order.is_owned_by(&Owner::User(user.user_id)),
        None => session.map_or(false, |session| {
            order.order.is_owned_by(&Owner::Guest(session.to_string()))
        }),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    request_body(content = Option<CheckoutDetails>, description = "Optional addresses, payment method and notes"),
    params(("X-Session-ID" = Option<String>, Header, description = "Guest session when not signed in")),
    responses(
        (status = 201, description = "Order placed from the cart", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Cart is empty or request invalid", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    owner: Owner,
    details: Option<Json<CheckoutDetails>>,
) -> Result<Response, ApiError> {
    let details = details.map(|Json(d)| d).unwrap_or_default();
    validate_input(&details)?;

    let order = state
        .services
        .orders
        .create_order_from_cart(&owner, details)
        .await?;
    Ok(created_response(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "orders",
    params(("X-Session-ID" = Option<String>, Header, description = "Guest session when not signed in")),
    responses((status = 200, description = "The caller's orders, newest first", body = ApiResponse<Vec<OrderWithItems>>))
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Response, ApiError> {
    let orders = state.services.orders.get_owner_orders(&owner).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("X-Session-ID" = Option<String>, Header, description = "Guest session when not signed in"),
    ),
    responses(
        (status = 200, description = "Order with its items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    session: Option<GuestSession>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state.services.orders.get_order(order_id).await?;
    let session = session.as_ref().map(|s| s.0.as_str());

    if !can_view(&order, user.as_ref(), session) {
        return Err(ServiceError::NotFound(format!("Order {} not found", order_id)).into());
    }
    Ok(success_response(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{order, OrderStatus, PaymentStatus, UserRole};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn order_for(user_id: Option<Uuid>, session_id: Option<&str>) -> OrderWithItems {
        let now = Utc::now();
        OrderWithItems {
            order: order::Model {
                id: Uuid::new_v4(),
                order_number: "ORD-20240101000000-ABCDEF012345".into(),
                user_id,
                session_id: session_id.map(str::to_string),
                status: OrderStatus::Pending,
                total_amount: Decimal::ONE_HUNDRED,
                payment_status: PaymentStatus::Pending,
                payment_method: None,
                shipping_address: None,
                billing_address: None,
                notes: None,
                created_at: now,
                updated_at: now,
            },
            items: Vec::new(),
        }
    }

    fn user(id: Uuid, role: UserRole) -> AuthUser {
        AuthUser {
            user_id: id,
            username: "u".into(),
            email: "u@example.com".into(),
            role,
        }
    }

    #[test]
    fn owners_and_admins_can_view() {
        let owner_id = Uuid::new_v4();
        let order = order_for(Some(owner_id), None);

        assert!(can_view(&order, Some(&user(owner_id, UserRole::Customer)), None));
        assert!(can_view(&order, Some(&user(Uuid::new_v4(), UserRole::Admin)), None));
        assert!(!can_view(&order, Some(&user(Uuid::new_v4(), UserRole::Customer)), None));
        assert!(!can_view(&order, None, Some("sess")));
    }

    #[test]
    fn guests_need_matching_session() {
        let order = order_for(None, Some("sess-1"));
        assert!(can_view(&order, None, Some("sess-1")));
        assert!(!can_view(&order, None, Some("sess-2")));
        assert!(!can_view(&order, None, None));
    }
}
