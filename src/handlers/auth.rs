use crate::{
    auth::{AuthUser, GuestSession},
    errors::ApiError,
    handlers::common::{created_response, message_response, success_response, validate_input},
    services::users::{AuthSession, LoginRequest, RegisterRequest, UserProfile},
    ApiResponse, AppState,
};
use axum::{extract::State, response::Response, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    pub user_id: Uuid,
    pub balance: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartMigrationResponse {
    pub migrated_items: usize,
}

/// Moves a guest cart onto a freshly signed-in user. Never fails the caller.
async fn absorb_guest_cart(state: &AppState, session: Option<GuestSession>, user_id: Uuid) {
    let Some(GuestSession(session_id)) = session else {
        return;
    };
    match state
        .services
        .cart
        .migrate_guest_to_user(&session_id, user_id)
        .await
    {
        Ok(moved) if moved > 0 => info!(%user_id, moved, "guest cart merged on sign-in"),
        Ok(_) => {}
        Err(err) => warn!(%user_id, error = %err, "guest cart migration failed"),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    params(("X-Session-ID" = Option<String>, Header, description = "Guest cart to merge into the new account")),
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AuthSession>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username or email already taken", body = crate::errors::ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    session: Option<GuestSession>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    validate_input(&request)?;
    let auth = state.services.users.register(request).await?;
    absorb_guest_cart(&state, session, auth.user.id).await;
    Ok(created_response(auth))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    params(("X-Session-ID" = Option<String>, Header, description = "Guest cart to merge into the account")),
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<AuthSession>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    session: Option<GuestSession>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    validate_input(&request)?;
    let auth = state.services.users.login(request).await?;
    absorb_guest_cart(&state, session, auth.user.id).await;
    Ok(success_response(auth))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserProfile>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let profile = state.services.users.profile(user.user_id).await?;
    Ok(success_response(profile))
}

#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    tag = "auth",
    responses(
        (status = 200, description = "Wallet balance", body = ApiResponse<WalletResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn wallet(State(state): State<AppState>, user: AuthUser) -> Result<Response, ApiError> {
    let balance = state.services.users.wallet_balance(user.user_id).await?;
    Ok(success_response(WalletResponse {
        user_id: user.user_id,
        balance,
    }))
}

/// Explicit guest-cart merge for clients that sign in elsewhere.
#[utoipa::path(
    post,
    path = "/api/v1/cart/migrate",
    tag = "cart",
    params(("X-Session-ID" = Option<String>, Header, description = "Guest cart to merge")),
    responses(
        (status = 200, description = "Guest cart merged", body = ApiResponse<CartMigrationResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn migrate_cart(
    State(state): State<AppState>,
    user: AuthUser,
    session: Option<GuestSession>,
) -> Result<Response, ApiError> {
    let Some(GuestSession(session_id)) = session else {
        return Ok(message_response("No guest session to migrate"));
    };
    let migrated_items = state
        .services
        .cart
        .migrate_guest_to_user(&session_id, user.user_id)
        .await?;
    Ok(success_response(CartMigrationResponse { migrated_items }))
}
