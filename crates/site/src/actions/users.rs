//! User management actions.
//!
//! Validated wrappers over the [`AuthService`] administration API. The
//! acting admin can never ban, remove, or demote themselves.

use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::instrument;

use savers_core::{Role, UserId};

use super::ActionError;
use crate::db::IdentityStore;
use crate::models::{Session, User, UserPage, UserQuery};
use crate::services::auth::{AuthError, AuthService};

/// Longest timed ban, in days. Longer bans should be permanent.
pub const MAX_BAN_DAYS: u32 = 36_500;

/// Raw fields of the "add user" form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl From<AuthError> for ActionError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::InvalidEmail(e) => Self::Validation(format!("Invalid email: {e}")),
            AuthError::WeakPassword(msg) | AuthError::InvalidName(msg) => Self::Validation(msg),
            AuthError::UserAlreadyExists => Self::Conflict(message),
            AuthError::UserNotFound => Self::NotFound("User not found".to_owned()),
            AuthError::InvalidCredentials | AuthError::Banned { .. } => Self::Validation(message),
            AuthError::Repository(e) => e.into(),
            AuthError::PasswordHash => Self::Storage(message),
        }
    }
}

/// Parse a role from a form value.
///
/// # Errors
///
/// Returns `ActionError::Validation` for an unknown role.
pub fn parse_role(value: &str) -> Result<Role, ActionError> {
    value
        .parse()
        .map_err(|_| ActionError::Validation(format!("Unknown role \"{}\"", value.trim())))
}

/// User administration on behalf of a signed-in admin.
pub struct UserActions<'a> {
    auth: AuthService<'a>,
}

impl<'a> UserActions<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn IdentityStore) -> Self {
        Self {
            auth: AuthService::new(store),
        }
    }

    /// One page of users.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn list(&self, search: Option<&str>, page: u32) -> Result<UserPage, ActionError> {
        let limit = UserQuery::DEFAULT_LIMIT;
        let query = UserQuery {
            search: super::optional(search),
            limit,
            offset: page.saturating_sub(1).saturating_mul(limit),
        };
        Ok(self.auth.list_users(&query).await?)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for invalid fields and
    /// `ActionError::Conflict` if the email is taken.
    #[instrument(skip(self, form))]
    pub async fn create(&self, form: &UserForm) -> Result<User, ActionError> {
        let role = match form.role.as_deref().map(str::trim) {
            None | Some("") => Role::User,
            Some(value) => parse_role(value)?,
        };
        Ok(self
            .auth
            .create_user(&form.name, &form.email, &form.password, role)
            .await?)
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when an admin demotes themselves.
    pub async fn set_role(&self, actor: &User, id: &UserId, role: Role) -> Result<User, ActionError> {
        if &actor.id == id && !role.is_admin() {
            return Err(ActionError::Validation(
                "You cannot remove your own admin role".to_owned(),
            ));
        }
        Ok(self.auth.set_role(id, role).await?)
    }

    /// Ban a user, optionally for a number of days.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when an admin bans themselves or
    /// `days` exceeds [`MAX_BAN_DAYS`].
    pub async fn ban(
        &self,
        actor: &User,
        id: &UserId,
        reason: Option<&str>,
        days: Option<u32>,
    ) -> Result<User, ActionError> {
        if &actor.id == id {
            return Err(ActionError::Validation("You cannot ban yourself".to_owned()));
        }
        let expires = match days.filter(|d| *d > 0) {
            None => None,
            Some(d) => Some(ban_expiry(d)?),
        };
        Ok(self.auth.ban_user(id, reason, expires).await?)
    }

    /// Lift a ban.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::NotFound` if the user does not exist.
    pub async fn unban(&self, id: &UserId) -> Result<User, ActionError> {
        Ok(self.auth.unban_user(id).await?)
    }

    /// Remove a user.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when an admin removes themselves.
    pub async fn remove(&self, actor: &User, id: &UserId) -> Result<(), ActionError> {
        if &actor.id == id {
            return Err(ActionError::Validation(
                "You cannot remove your own account".to_owned(),
            ));
        }
        Ok(self.auth.remove_user(id).await?)
    }

    /// Set a new password for a user.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for a weak password.
    pub async fn set_password(&self, id: &UserId, password: &str) -> Result<(), ActionError> {
        Ok(self.auth.set_user_password(id, password).await?)
    }

    /// A user's active sessions.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn sessions(&self, id: &UserId) -> Result<Vec<Session>, ActionError> {
        Ok(self.auth.list_user_sessions(id).await?)
    }

    /// Sign a user out everywhere.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn revoke_sessions(&self, id: &UserId) -> Result<u64, ActionError> {
        Ok(self.auth.revoke_user_sessions(id).await?)
    }
}

fn ban_expiry(days: u32) -> Result<chrono::DateTime<Utc>, ActionError> {
    let too_long = || ActionError::Validation("Ban length is too long".to_owned());
    if days > MAX_BAN_DAYS {
        return Err(too_long());
    }
    Duration::try_days(i64::from(days))
        .and_then(|length| Utc::now().checked_add_signed(length))
        .ok_or_else(too_long)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn form(email: &str, role: Option<&str>) -> UserForm {
        UserForm {
            name: " Grace ".to_owned(),
            email: email.to_owned(),
            password: "long enough password".to_owned(),
            role: role.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn test_create_trims_and_defaults_role() {
        let store = MemoryStore::new();
        let users = UserActions::new(&store);

        let user = users.create(&form("grace@savers.test", None)).await.unwrap();
        assert_eq!(user.name, "Grace");
        assert_eq!(user.role, Role::User);

        let err = users
            .create(&form("grace@savers.test", Some("admin")))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let store = MemoryStore::new();
        let users = UserActions::new(&store);

        assert!(matches!(
            users.create(&form("not-an-email", None)).await,
            Err(ActionError::Validation(_))
        ));
        assert!(matches!(
            users.create(&form("a@savers.test", Some("owner"))).await,
            Err(ActionError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_cannot_act_on_themselves() {
        let store = MemoryStore::new();
        let users = UserActions::new(&store);
        let admin = users
            .create(&form("admin@savers.test", Some("admin")))
            .await
            .unwrap();

        assert!(users.ban(&admin, &admin.id, None, None).await.is_err());
        assert!(users.remove(&admin, &admin.id).await.is_err());
        assert!(users.set_role(&admin, &admin.id, Role::User).await.is_err());
        assert!(users.set_role(&admin, &admin.id, Role::Admin).await.is_ok());
    }

    #[tokio::test]
    async fn test_timed_ban_sets_expiry() {
        let store = MemoryStore::new();
        let users = UserActions::new(&store);
        let admin = users
            .create(&form("admin@savers.test", Some("admin")))
            .await
            .unwrap();
        let member = users.create(&form("m@savers.test", None)).await.unwrap();

        let banned = users
            .ban(&admin, &member.id, Some("  "), Some(3))
            .await
            .unwrap();
        match banned.ban {
            savers_core::BanState::Banned { reason, expires } => {
                assert_eq!(reason, savers_core::DEFAULT_BAN_REASON);
                assert!(expires.unwrap() > Utc::now() + Duration::days(2));
            }
            savers_core::BanState::Active => panic!("expected a ban"),
        }
    }

    #[tokio::test]
    async fn test_overlong_ban_is_rejected() {
        let store = MemoryStore::new();
        let users = UserActions::new(&store);
        let admin = users
            .create(&form("admin@savers.test", Some("admin")))
            .await
            .unwrap();
        let member = users.create(&form("m@savers.test", None)).await.unwrap();

        for days in [MAX_BAN_DAYS + 1, u32::MAX] {
            let err = users
                .ban(&admin, &member.id, Some("spam"), Some(days))
                .await
                .unwrap_err();
            assert!(matches!(err, ActionError::Validation(_)));
        }
        let still_active = users.auth.get_user(&member.id).await.unwrap().unwrap();
        assert_eq!(still_active.ban, savers_core::BanState::Active);

        assert!(
            users
                .ban(&admin, &member.id, None, Some(MAX_BAN_DAYS))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_list_searches_and_pages() {
        let store = MemoryStore::new();
        let users = UserActions::new(&store);
        users.create(&form("alpha@savers.test", None)).await.unwrap();
        users.create(&form("beta@savers.test", None)).await.unwrap();

        let page = users.list(Some("ALPHA"), 1).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.users.len(), 1);

        let empty = users.list(None, 2).await.unwrap();
        assert_eq!(empty.total, 2);
        assert!(empty.users.is_empty());
    }
}
