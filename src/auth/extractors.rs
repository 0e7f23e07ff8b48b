use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::{AuthError, AuthUser};
use crate::common::{normalize_session_id, Owner, SESSION_HEADER};
use crate::errors::ApiError;

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Guest session id taken from the `X-Session-ID` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestSession(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for GuestSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::BadRequest(
                    "Session ID required for guest users (send X-Session-ID header)".to_string(),
                )
            })?;

        Ok(GuestSession(normalize_session_id(raw)?))
    }
}

/// Resolves the cart/order owner: the signed-in user if [`super::optional_auth`]
/// attached one, otherwise the guest session header.
#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(Owner::User(user.user_id));
        }
        let GuestSession(session) = GuestSession::from_request_parts(parts, state).await?;
        Ok(Owner::Guest(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::UserRole;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts(session: Option<&str>, user: Option<AuthUser>) -> Parts {
        let mut builder = Request::builder().uri("/cart");
        if let Some(session) = session {
            builder = builder.header(SESSION_HEADER, session);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(user) = user {
            parts.extensions.insert(user);
        }
        parts
    }

    #[tokio::test]
    async fn authenticated_user_wins_over_session_header() {
        let user_id = Uuid::new_v4();
        let user = AuthUser {
            user_id,
            username: "ada".into(),
            email: "ada@example.com".into(),
            role: UserRole::Customer,
        };
        let mut parts = parts(Some("guest-1"), Some(user));
        let owner = Owner::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(owner, Owner::User(user_id));
    }

    #[tokio::test]
    async fn guest_is_resolved_from_header() {
        let mut parts = parts(Some("guest-1"), None);
        let owner = Owner::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(owner, Owner::Guest("guest-1".into()));
    }

    #[tokio::test]
    async fn missing_identity_is_rejected() {
        let mut parts = parts(None, None);
        assert!(Owner::from_request_parts(&mut parts, &()).await.is_err());
    }
}
