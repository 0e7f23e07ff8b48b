/*!
 * # Authentication and Authorization Module
 *
 * Password hashing (Argon2id), HS256 bearer tokens and the axum middleware
 * that turns a token into an [`AuthUser`] request extension.
 *
 * Three middleware flavours are exposed:
 *
 * - [`require_auth`]: rejects requests without a valid token
 * - [`optional_auth`]: attaches the user when a valid token is present, otherwise
 *   lets the request through as a guest
 * - [`require_admin`]: must run after `require_auth`; rejects non-admin roles
 */

mod extractors;

pub use extractors::GuestSession;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{user, UserRole};
use crate::errors::ServiceError;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            user_id,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_issuer: cfg.jwt_issuer.clone(),
            token_expiration: Duration::from_secs(cfg.jwt_expiration_secs),
        }
    }
}

/// Issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Token issuance/validation and password hashing
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let expires_in = ChronoDuration::from_std(self.config.token_expiration)
            .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            iss: self.config.jwt_issuer.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(AccessToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: expires_in.num_seconds(),
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Resolves the bearer token in `headers`, if any.
    ///
    /// `Ok(None)` means no `Authorization: Bearer` header was sent.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<AuthUser>, AuthError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
        let Some(token) = value.strip_prefix("Bearer ") else {
            return Ok(None);
        };

        let claims = self.validate_token(token.trim())?;
        AuthUser::try_from(claims).map(Some)
    }
}

/// Hashes a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Checks `password` against a stored PHC hash. Malformed hashes never verify.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Admin access required".to_string(),
            ),
            Self::TokenCreation(_) | Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal authentication error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) | AuthError::InternalError(msg) => {
                ServiceError::JwtError(msg)
            }
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Rejects the request unless it carries a valid bearer token.
pub async fn require_auth(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = auth
        .authenticate(request.headers())?
        .ok_or(AuthError::MissingAuth)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Attaches the user when a valid token is present; anything else continues as a guest.
pub async fn optional_auth(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match auth.authenticate(request.headers()) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
        }
        Ok(None) => {}
        Err(e) => debug!("ignoring unusable bearer token on optional route: {}", e),
    }
    next.run(request).await
}

/// Requires an admin role. Layer this inside [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !user.is_admin() {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;
    use rust_decimal::Decimal;

    fn service(secret: &str) -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: secret.to_string(),
            jwt_issuer: "storefront-api".to_string(),
            token_expiration: Duration::from_secs(3600),
        })
    }

    fn user(role: UserRole) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            phone: None,
            role,
            is_active: true,
            email_verified: false,
            wallet_balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let auth = service("k9Qz7Lr2Vx4Bn8Wm1Tc6Yh3Jd5Fs0Pa-secret");
        let user = user(UserRole::Admin);
        let token = auth.generate_token(&user).unwrap();
        assert_eq!(token.expires_in, 3600);

        let claims = auth.validate_token(&token.access_token).unwrap();
        let auth_user = AuthUser::try_from(claims).unwrap();
        assert_eq!(auth_user.user_id, user.id);
        assert!(auth_user.is_admin());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issued = service("k9Qz7Lr2Vx4Bn8Wm1Tc6Yh3Jd5Fs0Pa-secret")
            .generate_token(&user(UserRole::Customer))
            .unwrap();
        let err = service("another-secret-of-sufficient-length-0987")
            .validate_token(&issued.access_token)
            .unwrap_err();
        assert_matches!(err, AuthError::InvalidToken);
    }

    #[test]
    fn authenticate_reads_bearer_header() {
        let auth = service("k9Qz7Lr2Vx4Bn8Wm1Tc6Yh3Jd5Fs0Pa-secret");
        let token = auth.generate_token(&user(UserRole::Customer)).unwrap();

        let mut headers = HeaderMap::new();
        assert!(auth.authenticate(&headers).unwrap().is_none());

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token.access_token)).unwrap(),
        );
        let user = auth.authenticate(&headers).unwrap().unwrap();
        assert!(!user.is_admin());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert_matches!(auth.authenticate(&headers), Err(AuthError::InvalidToken));
    }

    #[test]
    fn password_hash_verifies_only_original_password() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }
}
