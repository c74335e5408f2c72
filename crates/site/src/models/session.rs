//! Session-related types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use savers_core::{Role, SessionId, UserId};

use super::User;

/// A persisted sign-in session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    /// Opaque bearer token carried by the session cookie.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Fields for inserting a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A resolved identity: the signed-in user and their session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: User,
    pub session: Session,
}

/// Minimal view of the signed-in user handed to templates.
///
/// Never carries the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerView {
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: Role,
}

impl From<&User> for ViewerView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.to_string(),
            image: user.image.clone(),
            role: user.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_session_expiry_is_inclusive() {
        let now = Utc::now();
        let session = Session {
            id: SessionId::generate(),
            user_id: UserId::generate(),
            token: "t".to_owned(),
            expires_at: now,
            ip_address: None,
            user_agent: None,
            created_at: now - Duration::days(7),
            updated_at: now - Duration::days(7),
        };
        assert!(session.is_expired_at(now));
        assert!(!session.is_expired_at(now - Duration::seconds(1)));
    }
}
