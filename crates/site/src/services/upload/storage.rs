//! Object storage client.
//!
//! Production uploads go to a Supabase Storage bucket over its REST API.
//! Objects are addressed by key; their public URL ends with the key, which
//! is how deletes recover keys from stored URLs.

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::StorageConfig;

/// Errors that can occur when talking to object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Bucket operations used by the upload gateway.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store an object. Never overwrites an existing key.
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError>;

    /// Remove objects by key in one call.
    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;

    /// Public URL of an object.
    fn public_url(&self, key: &str) -> String;
}

fn public_object_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{base}/storage/v1/object/public/{bucket}/{key}")
}

/// Supabase Storage REST client.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl SupabaseStorage {
    /// Create a new storage client.
    ///
    /// # Errors
    ///
    /// Returns error if the service key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let key = config.service_key.expose_secret();
        let mut headers = HeaderMap::new();

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| StorageError::Config(format!("Invalid service key format: {e}")))?,
        );
        headers.insert(
            "apikey",
            HeaderValue::from_str(key)
                .map_err(|e| StorageError::Config(format!("Invalid service key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            bucket: config.bucket.clone(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/object/{}/{key}", self.base_url, self.bucket);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .header("cache-control", "max-age=3600")
            .body(bytes)
            .send()
            .await?;

        Self::check(response).await
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);

        let response = self
            .client
            .delete(&url)
            .json(&serde_json::json!({ "prefixes": keys }))
            .send()
            .await?;

        Self::check(response).await
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(&self.base_url, &self.bucket, key)
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStorage;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use axum::body::Bytes;

    use super::{ObjectStorage, StorageError, public_object_url};

    /// In-memory bucket that counts calls and can be told to fail.
    #[derive(Default)]
    pub struct MemoryStorage {
        objects: Mutex<HashMap<String, (String, usize)>>,
        calls: AtomicUsize,
        put_failures: AtomicUsize,
        fail_removes: AtomicBool,
    }

    impl MemoryStorage {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Total `put` and `remove` calls.
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Fail the next `n` puts.
        pub fn fail_next_puts(&self, n: usize) {
            self.put_failures.store(n, Ordering::SeqCst);
        }

        /// Make every remove fail.
        pub fn set_fail_removes(&self, fail: bool) {
            self.fail_removes.store(fail, Ordering::SeqCst);
        }

        /// Keys currently stored.
        #[must_use]
        pub fn keys(&self) -> Vec<String> {
            let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
            let mut keys: Vec<String> = objects.keys().cloned().collect();
            keys.sort();
            keys
        }

        /// Content type of a stored object.
        #[must_use]
        pub fn content_type(&self, key: &str) -> Option<String> {
            let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
            objects.get(key).map(|(content_type, _)| content_type.clone())
        }
    }

    fn unavailable() -> StorageError {
        StorageError::Api {
            status: 503,
            message: "storage unavailable".to_owned(),
        }
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn put(
            &self,
            key: &str,
            content_type: &str,
            bytes: Bytes,
        ) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .put_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(unavailable());
            }
            let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
            if objects.contains_key(key) {
                return Err(StorageError::Api {
                    status: 409,
                    message: "The resource already exists".to_owned(),
                });
            }
            objects.insert(key.to_owned(), (content_type.to_owned(), bytes.len()));
            Ok(())
        }

        async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_removes.load(Ordering::SeqCst) {
                return Err(unavailable());
            }
            let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
            for key in keys {
                objects.remove(key);
            }
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            public_object_url("https://storage.test", "images", key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_ends_with_key() {
        let url = public_object_url("https://x.supabase.co", "images", "1-abc-safe.png");
        assert_eq!(
            url,
            "https://x.supabase.co/storage/v1/object/public/images/1-abc-safe.png"
        );
    }

    #[test]
    fn test_client_rejects_key_with_newline() {
        let config = StorageConfig {
            url: "https://x.supabase.co".to_owned(),
            service_key: secrecy::SecretString::from("bad\nkey"),
            bucket: "images".to_owned(),
        };
        assert!(matches!(
            SupabaseStorage::new(&config),
            Err(StorageError::Config(_))
        ));
    }
}
