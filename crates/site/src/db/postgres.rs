//! `PostgreSQL` implementation of the store seams.

use async_trait::async_trait;
use sqlx::PgPool;

use savers_core::{BanState, CategoryId, Email, ProductId, Role, UserId};

use super::{
    CatalogStore, CategoryRepository, IdentityStore, ProductRepository, RepositoryError,
    SessionRepository, UserRepository,
};
use crate::models::{
    Category, CategoryInput, NewSession, NewUser, Product, ProductInput, Session, User, UserPage,
    UserQuery,
};

/// Store backed by the shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for health checks.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        CategoryRepository::new(&self.pool).list_all().await
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        CategoryRepository::new(&self.pool).get_by_id(id).await
    }

    async fn insert_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        CategoryRepository::new(&self.pool).create(input).await
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Option<Category>, RepositoryError> {
        CategoryRepository::new(&self.pool).update(id, input).await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        CategoryRepository::new(&self.pool).delete(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).list_all().await
    }

    async fn list_products_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&self.pool)
            .list_by_category(category_id)
            .await
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).get_by_id(id).await
    }

    async fn insert_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        ProductRepository::new(&self.pool).create(input).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool).update(id, input).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        ProductRepository::new(&self.pool).delete(id).await
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_id(id).await
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        UserRepository::new(&self.pool).get_credentials(email).await
    }

    async fn insert_user(
        &self,
        user: &NewUser,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool)
            .create_with_password(user, password_hash)
            .await
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage, RepositoryError> {
        UserRepository::new(&self.pool).list(query).await
    }

    async fn set_role(&self, id: &UserId, role: Role) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).update_role(id, role).await
    }

    async fn set_ban(&self, id: &UserId, ban: &BanState) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).update_ban(id, ban).await
    }

    async fn set_password(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        UserRepository::new(&self.pool)
            .update_password(id, password_hash)
            .await
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError> {
        UserRepository::new(&self.pool).delete(id).await
    }

    async fn insert_session(&self, session: &NewSession) -> Result<Session, RepositoryError> {
        SessionRepository::new(&self.pool).create(session).await
    }

    async fn find_session(
        &self,
        token: &str,
    ) -> Result<Option<(Session, User)>, RepositoryError> {
        SessionRepository::new(&self.pool).get_by_token(token).await
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<Session>, RepositoryError> {
        SessionRepository::new(&self.pool).list_for_user(user_id).await
    }

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError> {
        SessionRepository::new(&self.pool).delete_by_token(token).await
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<u64, RepositoryError> {
        SessionRepository::new(&self.pool)
            .delete_for_user(user_id)
            .await
    }
}
