use crate::{
    auth::{hash_password, verify_password, AccessToken, AuthService},
    entities::{user, UserRole},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Accounts, credentials and wallets.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub email_verified: bool,
    pub wallet_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserProfile {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            role: model.role,
            is_active: model.is_active,
            email_verified: model.email_verified,
            wallet_balance: model.wallet_balance,
            created_at: model.created_at,
        }
    }
}

/// Result of a successful register or login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub user: UserProfile,
    pub token: AccessToken,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    /// Creates a customer account and signs it in.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, ServiceError> {
        self.create_user(request, UserRole::Customer).await
    }

    /// Creates an account with an explicit role. Used by seeding.
    pub async fn create_user(
        &self,
        request: RegisterRequest,
        role: UserRole,
    ) -> Result<AuthSession, ServiceError> {
        request.validate()?;
        let password_hash = hash_password(&request.password)?;
        let now = Utc::now();

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username.trim().to_string()),
            email: Set(normalize_email(&request.email)),
            password_hash: Set(password_hash),
            first_name: Set(request.first_name),
            last_name: Set(request.last_name),
            phone: Set(request.phone),
            role: Set(role),
            is_active: Set(true),
            email_verified: Set(false),
            wallet_balance: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_write(e, "Username or email"))?;

        info!(user_id = %model.id, %role, "user registered");
        self.session_for(model)
    }

    /// Verifies credentials. Unknown email, wrong password and a deactivated
    /// account are indistinguishable to the caller.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, ServiceError> {
        request.validate()?;

        let Some(model) = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(&request.email)))
            .one(&*self.db)
            .await?
        else {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_password(&request.password, &model.password_hash) {
            warn!(user_id = %model.id, "failed login attempt");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        if !model.is_active {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        info!(user_id = %model.id, "user logged in");
        self.session_for(model)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        self.find_user(user_id).await.map(UserProfile::from)
    }

    pub async fn wallet_balance(&self, user_id: Uuid) -> Result<Decimal, ServiceError> {
        self.find_user(user_id).await.map(|u| u.wallet_balance)
    }

    /// Adds `delta` (possibly negative) to the wallet in one guarded UPDATE.
    ///
    /// The balance never drops below zero; returns the new balance.
    #[instrument(skip(self))]
    pub async fn adjust_wallet(&self, user_id: Uuid, delta: Decimal) -> Result<Decimal, ServiceError> {
        let result = user::Entity::update_many()
            .col_expr(
                user::Column::WalletBalance,
                Expr::col(user::Column::WalletBalance).add(delta),
            )
            .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user::Column::Id.eq(user_id))
            .filter(user::Column::WalletBalance.gte(-delta))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            self.find_user(user_id).await?;
            return Err(ServiceError::InsufficientBalance(format!(
                "wallet cannot cover {}",
                delta
            )));
        }

        let balance = self.wallet_balance(user_id).await?;
        info!(%user_id, %delta, %balance, "wallet adjusted");
        Ok(balance)
    }

    /// Customer accounts, newest first.
    pub async fn list_customers(&self) -> Result<Vec<UserProfile>, ServiceError> {
        let users = user::Entity::find()
            .filter(user::Column::Role.eq(UserRole::Customer))
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    fn session_for(&self, model: user::Model) -> Result<AuthSession, ServiceError> {
        let token = self.auth.generate_token(&model)?;
        Ok(AuthSession {
            user: model.into(),
            token,
        })
    }
}
