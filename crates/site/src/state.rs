//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::actions::{CategoryActions, ProductActions, UserActions};
use crate::cache::QueryCache;
use crate::config::SiteConfig;
use crate::db::{CatalogStore, IdentityStore, PgStore};
use crate::services::auth::AuthService;
use crate::services::upload::{ObjectStorage, RetryPolicy, UploadGateway};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Stores sit behind trait objects so tests can
/// swap in the in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SiteConfig,
    catalog: Arc<dyn CatalogStore>,
    identity: Arc<dyn IdentityStore>,
    cache: QueryCache,
    uploads: UploadGateway,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create the production state backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: SiteConfig, pool: PgPool, storage: Arc<dyn ObjectStorage>) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self::from_parts(
            config,
            store.clone(),
            store,
            storage,
            RetryPolicy::default(),
            Some(pool),
        )
    }

    /// Assemble state from explicit parts.
    #[must_use]
    pub fn from_parts(
        config: SiteConfig,
        catalog: Arc<dyn CatalogStore>,
        identity: Arc<dyn IdentityStore>,
        storage: Arc<dyn ObjectStorage>,
        retry: RetryPolicy,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                identity,
                cache: QueryCache::new(),
                uploads: UploadGateway::new(storage, retry),
                pool,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadGateway {
        &self.inner.uploads
    }

    /// The database pool, when running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityStore {
        self.inner.identity.as_ref()
    }

    /// Cached category reads and writes.
    #[must_use]
    pub fn categories(&self) -> CategoryActions<'_> {
        CategoryActions::new(self.inner.catalog.as_ref(), &self.inner.cache)
    }

    /// Cached product reads and writes.
    #[must_use]
    pub fn products(&self) -> ProductActions<'_> {
        ProductActions::new(self.inner.catalog.as_ref(), &self.inner.cache)
    }

    #[must_use]
    pub fn users(&self) -> UserActions<'_> {
        UserActions::new(self.inner.identity.as_ref())
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.inner.identity.as_ref())
    }
}

#[cfg(any(test, feature = "test-util"))]
mod testing {
    use secrecy::SecretString;

    use super::{AppState, Arc, RetryPolicy};
    use crate::config::{SiteConfig, StorageConfig};
    use crate::db::MemoryStore;
    use crate::services::upload::MemoryStorage;

    impl SiteConfig {
        /// Configuration for in-process tests; nothing here is dialed.
        #[must_use]
        pub fn for_tests() -> Self {
            Self {
                database_url: SecretString::from("postgres://localhost/savers_test"),
                host: std::net::IpAddr::from([127, 0, 0, 1]),
                port: 0,
                base_url: "http://localhost:3000".to_owned(),
                storage: StorageConfig {
                    url: "https://storage.test".to_owned(),
                    service_key: SecretString::from("in-memory"),
                    bucket: "images".to_owned(),
                },
                sentry_dsn: None,
                sentry_environment: None,
            }
        }
    }

    impl AppState {
        /// State backed by the in-memory store and storage, with no upload
        /// retry delay.
        #[must_use]
        pub fn in_memory(store: Arc<MemoryStore>, storage: Arc<MemoryStorage>) -> Self {
            Self::from_parts(
                SiteConfig::for_tests(),
                store.clone(),
                store,
                storage,
                RetryPolicy::immediate(),
                None,
            )
        }
    }
}
