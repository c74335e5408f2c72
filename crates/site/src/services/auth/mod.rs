//! Authentication service.
//!
//! Opaque session tokens stored in the `session` table, Argon2id password
//! credentials in `account`, and the administrative operations behind the
//! user management page.

mod error;

pub use error::{AccessError, AuthError};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use savers_core::{BanState, Email, Role, UserId};

use crate::db::IdentityStore;
use crate::models::{AuthSession, NewSession, NewUser, Session, User, UserPage, UserQuery};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Lifetime of a new session.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Random bytes in a session token.
const TOKEN_BYTES: usize = 32;

/// Request details recorded on new sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    store: &'a dyn IdentityStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn IdentityStore) -> Self {
        Self { store }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Resolve a session token to the signed-in user.
    ///
    /// Never fails: store errors are logged and treated as no session.
    /// Expired sessions are deleted. A banned user has no session; a ban
    /// whose expiry has passed is lifted here.
    #[instrument(skip_all)]
    pub async fn get_session(&self, token: &str) -> Option<AuthSession> {
        if token.is_empty() {
            return None;
        }

        let (session, mut user) = match self.store.find_session(token).await {
            Ok(found) => found?,
            Err(e) => {
                warn!(error = %e, "Session lookup failed");
                return None;
            }
        };

        let now = Utc::now();
        if session.is_expired_at(now) {
            if let Err(e) = self.store.delete_session(token).await {
                warn!(error = %e, "Failed to delete expired session");
            }
            return None;
        }

        if user.ban.has_lapsed_at(now) {
            match self.store.set_ban(&user.id, &BanState::Active).await {
                Ok(Some(lifted)) => user = lifted,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, user_id = %user.id, "Failed to lift expired ban");
                    user.ban = BanState::Active;
                }
            }
            info!(user_id = %user.id, "Expired ban lifted");
        }

        if user.ban.is_banned_at(now) {
            return None;
        }

        Some(AuthSession { user, session })
    }

    /// Require a signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Unauthenticated` when there is no session.
    pub fn require_auth(session: Option<AuthSession>) -> Result<AuthSession, AccessError> {
        session.ok_or(AccessError::Unauthenticated)
    }

    /// Require a signed-in admin.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::Unauthenticated` when there is no session and
    /// `AccessError::NotAdmin` when the user is not an admin.
    pub fn require_admin(session: Option<AuthSession>) -> Result<AuthSession, AccessError> {
        let session = Self::require_auth(session)?;
        if !session.user.is_admin() {
            return Err(AccessError::NotAdmin);
        }
        Ok(session)
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Sign in with email and password, creating a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email or password is
    /// wrong and `AuthError::Banned` if the account is banned.
    #[instrument(skip(self, password, meta))]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        meta: &ClientMeta,
    ) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (mut user, password_hash) = self
            .store
            .find_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        let now = Utc::now();
        if user.ban.has_lapsed_at(now) {
            user = self
                .store
                .set_ban(&user.id, &BanState::Active)
                .await?
                .ok_or(AuthError::UserNotFound)?;
        }
        if let BanState::Banned { reason, expires } = &user.ban
            && user.ban.is_banned_at(now)
        {
            return Err(AuthError::Banned {
                reason: reason.clone(),
                expires: *expires,
            });
        }

        let session = self.create_session(&user.id, meta).await?;
        info!(user_id = %user.id, "User signed in");
        Ok(AuthSession { user, session })
    }

    /// Register a new user and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidName` or
    /// `AuthError::WeakPassword` for invalid input and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, password, meta))]
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
        meta: &ClientMeta,
    ) -> Result<AuthSession, AuthError> {
        let user = self.create_user(name, email, password, Role::User).await?;
        let session = self.create_session(&user.id, meta).await?;
        info!(user_id = %user.id, "User signed up");
        Ok(AuthSession { user, session })
    }

    /// Delete the session behind `token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.store.delete_session(token).await?;
        Ok(())
    }

    async fn create_session(&self, user_id: &UserId, meta: &ClientMeta) -> Result<Session, AuthError> {
        let session = self
            .store
            .insert_session(&NewSession {
                user_id: user_id.clone(),
                token: generate_token(),
                expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
            })
            .await?;
        Ok(session)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// List users matching a search.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn list_users(&self, query: &UserQuery) -> Result<UserPage, AuthError> {
        Ok(self.store.list_users(query).await?)
    }

    /// Create a user with a password credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::InvalidName` or
    /// `AuthError::WeakPassword` for invalid input and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidName("Name is required".to_owned()));
        }
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .store
            .insert_user(
                &NewUser {
                    name: name.to_owned(),
                    email,
                    role,
                },
                &password_hash,
            )
            .await?;
        info!(user_id = %user.id, %role, "User created");
        Ok(user)
    }

    /// Ban a user and revoke their sessions.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn ban_user(
        &self,
        id: &UserId,
        reason: Option<&str>,
        expires: Option<DateTime<Utc>>,
    ) -> Result<User, AuthError> {
        let user = self
            .store
            .set_ban(id, &BanState::banned(reason, expires))
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.store.delete_sessions_for_user(id).await?;
        info!("User banned");
        Ok(user)
    }

    /// Lift a ban.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn unban_user(&self, id: &UserId) -> Result<User, AuthError> {
        let user = self
            .store
            .set_ban(id, &BanState::Active)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        info!("User unbanned");
        Ok(user)
    }

    /// Delete a user with their sessions and credentials.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn remove_user(&self, id: &UserId) -> Result<(), AuthError> {
        self.store.delete_sessions_for_user(id).await?;
        if !self.store.delete_user(id).await? {
            return Err(AuthError::UserNotFound);
        }
        info!("User removed");
        Ok(())
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn set_role(&self, id: &UserId, role: Role) -> Result<User, AuthError> {
        let user = self
            .store
            .set_role(id, role)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        info!(%role, "User role changed");
        Ok(user)
    }

    /// Replace a user's password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for an invalid password and
    /// `AuthError::UserNotFound` if the user has no credential account.
    #[instrument(skip(self, password))]
    pub async fn set_user_password(&self, id: &UserId, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;
        if !self.store.set_password(id, &password_hash).await? {
            return Err(AuthError::UserNotFound);
        }
        info!("User password changed");
        Ok(())
    }

    /// List a user's sessions.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn list_user_sessions(&self, id: &UserId) -> Result<Vec<Session>, AuthError> {
        Ok(self.store.list_sessions(id).await?)
    }

    /// Revoke every session of a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    #[instrument(skip(self))]
    pub async fn revoke_user_sessions(&self, id: &UserId) -> Result<u64, AuthError> {
        let revoked = self.store.delete_sessions_for_user(id).await?;
        info!(revoked, "User sessions revoked");
        Ok(revoked)
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, AuthError> {
        Ok(self.store.find_user(id).await?)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a URL-safe random session token.
fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    const PASSWORD: &str = "correct horse battery";

    fn meta() -> ClientMeta {
        ClientMeta {
            ip_address: Some("203.0.113.7".to_owned()),
            user_agent: Some("test-agent".to_owned()),
        }
    }

    async fn signed_up(store: &MemoryStore, email: &str) -> AuthSession {
        AuthService::new(store)
            .sign_up("Test User", email, PASSWORD, &meta())
            .await
            .unwrap()
    }

    #[test]
    fn test_generated_tokens_are_url_safe_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password(PASSWORD).unwrap();
        assert!(verify_password(PASSWORD, &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_password_length_rules() {
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[tokio::test]
    async fn test_sign_up_then_session_lookup() {
        let store = MemoryStore::new();
        let signed = signed_up(&store, "new@savers.test").await;
        assert_eq!(signed.session.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(signed.user.role, Role::User);

        let resolved = AuthService::new(&store)
            .get_session(&signed.session.token)
            .await
            .unwrap();
        assert_eq!(resolved.user.id, signed.user.id);
    }

    #[tokio::test]
    async fn test_sign_in_rejects_wrong_password() {
        let store = MemoryStore::new();
        signed_up(&store, "user@savers.test").await;

        let err = AuthService::new(&store)
            .sign_in("user@savers.test", "not the password", &meta())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_in_normalizes_email() {
        let store = MemoryStore::new();
        signed_up(&store, "user@savers.test").await;

        let signed = AuthService::new(&store)
            .sign_in("  USER@Savers.test ", PASSWORD, &meta())
            .await
            .unwrap();
        assert_eq!(signed.user.email.as_str(), "user@savers.test");
    }

    #[tokio::test]
    async fn test_expired_session_is_deleted() {
        let store = MemoryStore::new();
        let signed = signed_up(&store, "old@savers.test").await;
        store
            .insert_session(&NewSession {
                user_id: signed.user.id.clone(),
                token: "stale".to_owned(),
                expires_at: Utc::now() - Duration::minutes(1),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        let auth = AuthService::new(&store);
        assert!(auth.get_session("stale").await.is_none());
        assert!(store.find_session("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ban_revokes_sessions_and_blocks_sign_in() {
        let store = MemoryStore::new();
        let signed = signed_up(&store, "spam@savers.test").await;
        let auth = AuthService::new(&store);

        auth.ban_user(&signed.user.id, Some("Spam"), None).await.unwrap();
        assert!(auth.get_session(&signed.session.token).await.is_none());

        let err = auth
            .sign_in("spam@savers.test", PASSWORD, &meta())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "This account is banned: Spam");
    }

    #[tokio::test]
    async fn test_lapsed_ban_is_lifted_on_lookup() {
        let store = MemoryStore::new();
        let signed = signed_up(&store, "temp@savers.test").await;
        store
            .set_ban(
                &signed.user.id,
                &BanState::banned(None, Some(Utc::now() - Duration::seconds(1))),
            )
            .await
            .unwrap();

        let resolved = AuthService::new(&store)
            .get_session(&signed.session.token)
            .await
            .unwrap();
        assert_eq!(resolved.user.ban, BanState::Active);
        let stored = store.find_user(&signed.user.id).await.unwrap().unwrap();
        assert_eq!(stored.ban, BanState::Active);
    }

    #[tokio::test]
    async fn test_store_failure_means_no_session() {
        let store = MemoryStore::new();
        let signed = signed_up(&store, "x@savers.test").await;
        store.set_failing(true);

        assert!(
            AuthService::new(&store)
                .get_session(&signed.session.token)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_require_admin_gates_by_role() {
        let store = MemoryStore::new();
        let signed = signed_up(&store, "member@savers.test").await;

        assert_eq!(
            AuthService::require_auth(None).unwrap_err(),
            AccessError::Unauthenticated
        );
        assert_eq!(
            AuthService::require_admin(Some(signed.clone())).unwrap_err(),
            AccessError::NotAdmin
        );

        let auth = AuthService::new(&store);
        auth.set_role(&signed.user.id, Role::Admin).await.unwrap();
        let admin = auth.get_session(&signed.session.token).await;
        let passed = AuthService::require_admin(admin).unwrap();
        assert_eq!(passed.session.token, signed.session.token);
    }

    #[tokio::test]
    async fn test_sign_out_removes_session() {
        let store = MemoryStore::new();
        let signed = signed_up(&store, "bye@savers.test").await;
        let auth = AuthService::new(&store);

        auth.sign_out(&signed.session.token).await.unwrap();
        assert!(auth.get_session(&signed.session.token).await.is_none());
    }
}
