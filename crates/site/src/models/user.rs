//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use savers_core::{BanState, Email, Role, UserId};

/// A site user (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Unique, normalized email address.
    pub email: Email,
    /// Whether the email has been verified.
    pub email_verified: bool,
    /// Avatar URL.
    pub image: Option<String>,
    /// Optional unique handle.
    pub username: Option<String>,
    /// Handle with the user's preferred casing.
    pub display_username: Option<String>,
    /// Access role.
    pub role: Role,
    /// Current ban state.
    pub ban: BanState,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this user may use the admin dashboard.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Fields for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub role: Role,
}

/// Search and paging parameters for the user list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Case-insensitive match against name or email.
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl UserQuery {
    /// Default page size for the admin user table.
    pub const DEFAULT_LIMIT: u32 = 50;
}

/// One page of users plus the total number matching the query.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: u64,
}
