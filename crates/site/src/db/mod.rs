//! Database operations for the Savers `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `"user"` - Site users with role and ban columns
//! - `session` - Opaque-token sign-in sessions
//! - `account` - Credential records (Argon2id password hashes)
//! - `category` - Product categories
//! - `product` - Catalog products (cascade-deleted with their category)
//!
//! Actions never talk to the pool directly. They go through the
//! [`CatalogStore`] and [`IdentityStore`] seams, implemented by
//! [`PgStore`] in production and by `MemoryStore` in tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/site/migrations/` and run via:
//! ```bash
//! cargo run -p savers-cli -- migrate
//! ```

pub mod categories;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod postgres;
pub mod products;
pub mod sessions;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use savers_core::{BanState, CategoryId, Email, ProductId, Role, UserId};

use crate::models::{
    Category, CategoryInput, NewSession, NewUser, Product, ProductInput, Session, User, UserPage,
    UserQuery,
};

pub use categories::CategoryRepository;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use products::ProductRepository;
pub use sessions::SessionRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A referenced row does not exist.
    #[error("invalid reference: {0}")]
    ForeignKey(String),
}

impl RepositoryError {
    /// Map a write error, turning unique and foreign key violations into
    /// readable variants.
    pub(crate) fn from_write(error: sqlx::Error, conflict: &str, reference: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = error {
            if db_err.is_unique_violation() {
                return Self::Conflict(conflict.to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return Self::ForeignKey(reference.to_owned());
            }
        }
        Self::Database(error)
    }
}

/// Categories and products.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;

    /// Insert a category.
    ///
    /// Returns `RepositoryError::Conflict` when the name is taken.
    async fn insert_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError>;

    /// Update a category, returning `None` if it does not exist.
    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Option<Category>, RepositoryError>;

    /// Delete a category and, through the cascade, its products.
    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError>;

    /// All products, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Products of one category, newest first.
    async fn list_products_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert a product.
    ///
    /// Returns `RepositoryError::ForeignKey` when the category does not exist.
    async fn insert_product(&self, input: &ProductInput) -> Result<Product, RepositoryError>;

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

/// Users, credentials and sessions.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// A user and their credential password hash, looked up by email.
    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Insert a user with a credential account.
    ///
    /// Returns `RepositoryError::Conflict` when the email is taken.
    async fn insert_user(
        &self,
        user: &NewUser,
        password_hash: &str,
    ) -> Result<User, RepositoryError>;

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage, RepositoryError>;

    async fn set_role(&self, id: &UserId, role: Role) -> Result<Option<User>, RepositoryError>;

    async fn set_ban(&self, id: &UserId, ban: &BanState) -> Result<Option<User>, RepositoryError>;

    /// Replace the credential password hash. Returns `false` if the user has
    /// no credential account.
    async fn set_password(&self, id: &UserId, password_hash: &str)
    -> Result<bool, RepositoryError>;

    /// Delete a user. Sessions and accounts go with it.
    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError>;

    async fn insert_session(&self, session: &NewSession) -> Result<Session, RepositoryError>;

    /// A session and its owner, looked up by token.
    async fn find_session(&self, token: &str)
    -> Result<Option<(Session, User)>, RepositoryError>;

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<Session>, RepositoryError>;

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError>;

    /// Delete every session of a user, returning how many were removed.
    async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<u64, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
