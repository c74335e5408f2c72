//! Authentication error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] savers_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// User not found.
    #[error("User not found")]
    UserNotFound,

    /// User already exists.
    #[error("A user with this email already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Name missing or invalid.
    #[error("{0}")]
    InvalidName(String),

    /// The account is banned.
    #[error("{}", banned_message(reason, *expires))]
    Banned {
        reason: String,
        expires: Option<DateTime<Utc>>,
    },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => Self::UserAlreadyExists,
            RepositoryError::NotFound => Self::UserNotFound,
            other => Self::Repository(other),
        }
    }
}

fn banned_message(reason: &str, expires: Option<DateTime<Utc>>) -> String {
    match expires {
        Some(at) => format!(
            "This account is banned until {}: {reason}",
            at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => format!("This account is banned: {reason}"),
    }
}

/// Why a request was refused at an access gate.
///
/// Both variants are rendered as a redirect to the sign-in page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    /// No valid session.
    #[error("sign-in required")]
    Unauthenticated,
    /// Signed in, but not an admin.
    #[error("admin role required")]
    NotAdmin,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_banned_message_mentions_expiry() {
        let err = AuthError::Banned {
            reason: "Spam".to_owned(),
            expires: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).single(),
        };
        assert_eq!(
            err.to_string(),
            "This account is banned until 2030-01-02 03:04 UTC: Spam"
        );
    }

    #[test]
    fn test_conflict_maps_to_user_already_exists() {
        let err = AuthError::from(RepositoryError::Conflict("dup".to_owned()));
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }
}
