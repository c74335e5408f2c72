//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create the first admin user
//! savers-cli admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//!
//! # Promote an existing user to admin
//! savers-cli admin promote -e someone@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `SAVERS_DATABASE_URL` - `PostgreSQL` connection string
//! - `SAVERS_ADMIN_PASSWORD` - Password for `admin create` when `-p` is omitted

use thiserror::Error;

use savers_core::{Email, Role};
use savers_site::db::{PgStore, create_pool};
use savers_site::models::UserQuery;
use savers_site::services::auth::{AuthError, AuthService};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, user")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No user has the given email.
    #[error("No user with email: {0}")]
    UserNotFound(String),

    /// Rejected by the auth service.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

async fn connect() -> Result<PgStore, AdminError> {
    let database_url = super::database_url().map_err(AdminError::MissingEnvVar)?;
    tracing::info!("Connecting to database...");
    Ok(PgStore::new(create_pool(&database_url).await?))
}

/// Create a user with a password credential.
///
/// # Errors
///
/// Returns `AdminError` for an unknown role, invalid input, a taken email or
/// a database failure.
pub async fn create_user(
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<(), AdminError> {
    let role: Role = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|e| AdminError::InvalidEmail(e.to_string()))?;

    let store = connect().await?;
    let user = AuthService::new(&store)
        .create_user(name, email.as_str(), password, role)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, %role, "User created");
    Ok(())
}

/// Give an existing user the admin role.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no user has `email`.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|e| AdminError::InvalidEmail(e.to_string()))?;

    let store = connect().await?;
    let auth = AuthService::new(&store);

    let page = auth
        .list_users(&UserQuery {
            search: Some(email.as_str().to_owned()),
            limit: UserQuery::DEFAULT_LIMIT,
            offset: 0,
        })
        .await?;
    let user = page
        .users
        .into_iter()
        .find(|u| u.email == email)
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    if user.is_admin() {
        tracing::info!(email = %user.email, "User is already an admin");
        return Ok(());
    }

    auth.set_role(&user.id, Role::Admin).await?;
    tracing::info!(email = %user.email, "User promoted to admin");
    Ok(())
}
