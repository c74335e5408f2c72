//! In-memory implementation of the store seams for tests.
//!
//! Mirrors the constraints the migrations declare: unique category names and
//! user emails, the product-to-category foreign key, and the cascades from
//! category to product and from user to session. Every call is counted so
//! tests can assert how often the cache falls through to the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use savers_core::{BanState, CategoryId, Email, ProductId, Role, SessionId, UserId};

use super::{CatalogStore, IdentityStore, RepositoryError};
use crate::models::{
    Category, CategoryInput, NewSession, NewUser, Product, ProductInput, Session, User, UserPage,
    UserQuery,
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    categories: Vec<Category>,
    products: Vec<Product>,
    users: Vec<User>,
    passwords: HashMap<UserId, String>,
    sessions: Vec<Session>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    catalog_reads: AtomicUsize,
    identity_reads: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalog read calls served so far.
    #[must_use]
    pub fn catalog_reads(&self) -> usize {
        self.catalog_reads.load(Ordering::SeqCst)
    }

    /// Number of identity read calls served so far.
    #[must_use]
    pub fn identity_reads(&self) -> usize {
        self.identity_reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.tables.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn catalog_read(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
        self.tables()
    }

    fn identity_read(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.identity_reads.fetch_add(1, Ordering::SeqCst);
        self.tables()
    }
}

fn newest_first(products: &mut [Product]) {
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let tables = self.catalog_read()?;
        let mut categories = tables.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let tables = self.catalog_read()?;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_category(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.categories.iter().any(|c| c.name == input.name) {
            return Err(RepositoryError::Conflict(
                "A category with this name already exists".to_owned(),
            ));
        }
        let now = Utc::now();
        let category = Category {
            id: CategoryId::new(tables.next_id()),
            name: input.name.clone(),
            image: input.image.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Option<Category>, RepositoryError> {
        let mut tables = self.tables()?;
        if tables
            .categories
            .iter()
            .any(|c| c.id != id && c.name == input.name)
        {
            return Err(RepositoryError::Conflict(
                "A category with this name already exists".to_owned(),
            ));
        }
        let Some(category) = tables.categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        category.name.clone_from(&input.name);
        category.image.clone_from(&input.image);
        category.updated_at = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        let removed = tables.categories.len() < before;
        if removed {
            tables.products.retain(|p| p.category_id != id);
        }
        Ok(removed)
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.catalog_read()?;
        let mut products = tables.products.clone();
        newest_first(&mut products);
        Ok(products)
    }

    async fn list_products_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.catalog_read()?;
        let mut products: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| p.category_id == category_id)
            .cloned()
            .collect();
        newest_first(&mut products);
        Ok(products)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let tables = self.catalog_read()?;
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_product(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.categories.iter().any(|c| c.id == input.category_id) {
            return Err(RepositoryError::ForeignKey(
                "Category does not exist".to_owned(),
            ));
        }
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(tables.next_id()),
            name: input.name.clone(),
            model: input.model.clone(),
            description: input.description.clone(),
            category_id: input.category_id,
            key_features: input.key_features.clone(),
            specifications: input.specifications.clone(),
            image: input.image.clone(),
            brochure_url: input.brochure_url.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.categories.iter().any(|c| c.id == input.category_id) {
            return Err(RepositoryError::ForeignKey(
                "Category does not exist".to_owned(),
            ));
        }
        let Some(product) = tables.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        product.name.clone_from(&input.name);
        product.model.clone_from(&input.model);
        product.description.clone_from(&input.description);
        product.category_id = input.category_id;
        product.key_features.clone_from(&input.key_features);
        product.specifications.clone_from(&input.specifications);
        product.image.clone_from(&input.image);
        product.brochure_url.clone_from(&input.brochure_url);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.products.len();
        tables.products.retain(|p| p.id != id);
        Ok(tables.products.len() < before)
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.identity_read()?;
        Ok(tables.users.iter().find(|u| &u.id == id).cloned())
    }

    async fn find_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let tables = self.identity_read()?;
        Ok(tables
            .users
            .iter()
            .find(|u| &u.email == email)
            .and_then(|u| {
                tables
                    .passwords
                    .get(&u.id)
                    .map(|hash| (u.clone(), hash.clone()))
            }))
    }

    async fn insert_user(
        &self,
        user: &NewUser,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("User already exists".to_owned()));
        }
        let now = Utc::now();
        let created = User {
            id: UserId::generate(),
            name: user.name.clone(),
            email: user.email.clone(),
            email_verified: false,
            image: None,
            username: None,
            display_username: None,
            role: user.role,
            ban: BanState::Active,
            created_at: now,
            updated_at: now,
        };
        tables
            .passwords
            .insert(created.id.clone(), password_hash.to_owned());
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage, RepositoryError> {
        let tables = self.identity_read()?;
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<User> = tables
            .users
            .iter()
            .filter(|u| {
                needle.as_deref().is_none_or(|n| {
                    u.name.to_lowercase().contains(n) || u.email.as_str().contains(n)
                })
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let users = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(UserPage { users, total })
    }

    async fn set_role(&self, id: &UserId, role: Role) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables()?;
        Ok(tables.users.iter_mut().find(|u| &u.id == id).map(|u| {
            u.role = role;
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn set_ban(&self, id: &UserId, ban: &BanState) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables()?;
        Ok(tables.users.iter_mut().find(|u| &u.id == id).map(|u| {
            u.ban = ban.clone();
            u.updated_at = Utc::now();
            u.clone()
        }))
    }

    async fn set_password(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        Ok(tables
            .passwords
            .get_mut(id)
            .map(|hash| password_hash.clone_into(hash))
            .is_some())
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.users.len();
        tables.users.retain(|u| &u.id != id);
        let removed = tables.users.len() < before;
        if removed {
            tables.passwords.remove(id);
            tables.sessions.retain(|s| &s.user_id != id);
        }
        Ok(removed)
    }

    async fn insert_session(&self, session: &NewSession) -> Result<Session, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.users.iter().any(|u| u.id == session.user_id) {
            return Err(RepositoryError::ForeignKey("user".to_owned()));
        }
        let now = Utc::now();
        let created = Session {
            id: SessionId::generate(),
            user_id: session.user_id.clone(),
            token: session.token.clone(),
            expires_at: session.expires_at,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(created.clone());
        Ok(created)
    }

    async fn find_session(
        &self,
        token: &str,
    ) -> Result<Option<(Session, User)>, RepositoryError> {
        let tables = self.identity_read()?;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.token == token)
            .and_then(|s| {
                tables
                    .users
                    .iter()
                    .find(|u| u.id == s.user_id)
                    .map(|u| (s.clone(), u.clone()))
            }))
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<Session>, RepositoryError> {
        let tables = self.identity_read()?;
        let mut sessions: Vec<Session> = tables
            .sessions
            .iter()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.token != token);
        Ok(tables.sessions.len() < before)
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<u64, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| &s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn category(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_owned(),
            image: format!("https://cdn.test/{name}.png"),
        }
    }

    fn product(category_id: CategoryId) -> ProductInput {
        ProductInput {
            name: "Locker".to_owned(),
            model: Some("L-4".to_owned()),
            description: "Four door locker".to_owned(),
            category_id,
            key_features: vec!["Steel".to_owned()],
            specifications: [("Doors".to_owned(), "4".to_owned())].into(),
            image: "https://cdn.test/locker.png".to_owned(),
            brochure_url: None,
        }
    }

    #[tokio::test]
    async fn test_category_delete_cascades_to_products() {
        let store = MemoryStore::new();
        let lockers = store.insert_category(&category("Lockers")).await.unwrap();
        let item = store.insert_product(&product(lockers.id)).await.unwrap();

        assert!(store.delete_category(lockers.id).await.unwrap());
        assert!(store.find_product(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_product_requires_existing_category() {
        let store = MemoryStore::new();
        let err = store
            .insert_product(&product(CategoryId::new(99)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKey(_)));
    }

    #[tokio::test]
    async fn test_duplicate_category_name_conflicts() {
        let store = MemoryStore::new();
        store.insert_category(&category("Safes")).await.unwrap();
        let err = store.insert_category(&category("Safes")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_are_counted_and_failures_injected() {
        let store = MemoryStore::new();
        store.list_categories().await.unwrap();
        store.list_products().await.unwrap();
        assert_eq!(store.catalog_reads(), 2);

        store.set_failing(true);
        assert!(store.list_categories().await.is_err());
    }

    #[tokio::test]
    async fn test_user_delete_cascades_to_sessions() {
        let store = MemoryStore::new();
        let user = store
            .insert_user(
                &NewUser {
                    name: "Ada".to_owned(),
                    email: Email::parse("ada@savers.test").unwrap(),
                    role: Role::User,
                },
                "hash",
            )
            .await
            .unwrap();
        store
            .insert_session(&NewSession {
                user_id: user.id.clone(),
                token: "tok".to_owned(),
                expires_at: Utc::now(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        assert!(store.delete_user(&user.id).await.unwrap());
        assert!(store.find_session("tok").await.unwrap().is_none());
    }
}
