//! Time-boxed read cache for catalog queries.
//!
//! Two `moka` caches, one per tag: categories live for an hour, products for
//! a minute. Every mutation calls [`QueryCache::invalidate`] for the tags it
//! touches, which clears the whole tag for all readers.
//!
//! Each tag also carries a generation counter, bumped before the tag is
//! cleared. Entries are stamped with the generation their load started at,
//! and a hit only counts while that stamp is still current. A load that
//! raced a write may still land in the cache, but it is never served.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use savers_core::{CategoryId, ProductId};

use crate::db::RepositoryError;
use crate::models::{Category, Product};

/// Default lifetime of cached category reads.
pub const CATEGORIES_TTL: Duration = Duration::from_secs(60 * 60);
/// Default lifetime of cached product reads.
pub const PRODUCTS_TTL: Duration = Duration::from_secs(60);

const MAX_ENTRIES: u64 = 1_000;

/// Group of cache entries invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTag {
    Categories,
    Products,
}

/// Cache key, one variant per query shape.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Categories,
    Category(CategoryId),
    Products,
    ProductsByCategory(CategoryId),
    Product(ProductId),
}

impl CacheKey {
    /// The tag whose invalidation clears this key.
    #[must_use]
    pub const fn tag(&self) -> CacheTag {
        match self {
            Self::Categories | Self::Category(_) => CacheTag::Categories,
            Self::Products | Self::ProductsByCategory(_) | Self::Product(_) => CacheTag::Products,
        }
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Vec<Category>),
    Category(Option<Category>),
    Products(Vec<Product>),
    Product(Option<Box<Product>>),
}

macro_rules! cache_value_conversions {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for CacheValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }

        impl TryFrom<CacheValue> for $ty {
            type Error = CacheValue;

            fn try_from(value: CacheValue) -> Result<Self, Self::Error> {
                match value {
                    CacheValue::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

cache_value_conversions!(Categories, Vec<Category>);
cache_value_conversions!(Category, Option<Category>);
cache_value_conversions!(Products, Vec<Product>);
cache_value_conversions!(Product, Option<Box<Product>>);

#[derive(Clone)]
struct Entry {
    generation: u64,
    value: CacheValue,
}

struct Tagged {
    cache: Cache<CacheKey, Entry>,
    generation: AtomicU64,
}

impl Tagged {
    fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
            generation: AtomicU64::new(0),
        }
    }
}

/// Process-wide query cache, owned by `AppState`.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

struct Inner {
    categories: Tagged,
    products: Tagged,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    /// Create a cache with the default lifetimes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttls(CATEGORIES_TTL, PRODUCTS_TTL)
    }

    /// Create a cache with custom lifetimes.
    #[must_use]
    pub fn with_ttls(categories: Duration, products: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                categories: Tagged::new(categories),
                products: Tagged::new(products),
            }),
        }
    }

    fn tagged(&self, tag: CacheTag) -> &Tagged {
        match tag {
            CacheTag::Categories => &self.inner.categories,
            CacheTag::Products => &self.inner.products,
        }
    }

    /// Return the cached value for `key`, or run `load` and cache its result.
    ///
    /// Errors from `load` are returned and never cached.
    ///
    /// # Errors
    ///
    /// Returns whatever error `load` returns.
    pub async fn get_or_load<T, F, Fut>(&self, key: CacheKey, load: F) -> Result<T, RepositoryError>
    where
        T: Into<CacheValue> + TryFrom<CacheValue> + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let tagged = self.tagged(key.tag());

        let generation = tagged.generation.load(Ordering::Acquire);

        if let Some(entry) = tagged.cache.get(&key).await
            && entry.generation == generation
            && let Ok(hit) = T::try_from(entry.value)
        {
            debug!(?key, "Cache hit");
            return Ok(hit);
        }

        let loaded = load().await?;

        if tagged.generation.load(Ordering::Acquire) == generation {
            let entry = Entry {
                generation,
                value: loaded.clone().into(),
            };
            tagged.cache.insert(key, entry).await;
        } else {
            debug!(?key, "Skipping write-back after concurrent invalidation");
        }

        Ok(loaded)
    }

    /// Drop every entry under `tag`.
    pub fn invalidate(&self, tag: CacheTag) {
        let tagged = self.tagged(tag);
        tagged.generation.fetch_add(1, Ordering::AcqRel);
        tagged.cache.invalidate_all();
        debug!(?tag, "Cache invalidated");
    }
}
