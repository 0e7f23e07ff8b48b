/// Common types shared across handlers and services
use std::fmt;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Header carrying the opaque guest session identifier.
pub const SESSION_HEADER: &str = "x-session-id";

const MAX_SESSION_ID_LEN: usize = 128;

/// Trims a client-supplied session id, rejecting empty, oversized or non-printable values.
pub fn normalize_session_id(raw: &str) -> Result<String, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_SESSION_ID_LEN {
        return Err(ServiceError::ValidationError(format!(
            "session id must be 1-{} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    if !trimmed.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ServiceError::ValidationError(
            "session id must contain only visible ASCII characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Whoever a cart or order belongs to: a signed-in user or an anonymous session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    User(Uuid),
    Guest(String),
}

impl Owner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Owner::User(id) => Some(*id),
            Owner::Guest(_) => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Owner::User(_) => None,
            Owner::Guest(session) => Some(session),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::User(id) => write!(f, "user:{}", id),
            Owner::Guest(session) => write!(f, "guest:{}", session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_session_ids_are_trimmed_and_bounded() {
        assert_eq!(normalize_session_id("  abc-123 ").unwrap(), "abc-123");
        assert!(normalize_session_id("").is_err());
        assert!(normalize_session_id("   ").is_err());
        assert!(normalize_session_id("a b").is_err());
        assert!(normalize_session_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn accessors_match_variant() {
        let id = Uuid::new_v4();
        let user = Owner::User(id);
        assert_eq!(user.user_id(), Some(id));
        assert_eq!(user.session_id(), None);

        let guest = Owner::Guest("s1".into());
        assert_eq!(guest.user_id(), None);
        assert_eq!(guest.session_id(), Some("s1"));
        assert_eq!(guest.to_string(), "guest:s1");
    }
}
