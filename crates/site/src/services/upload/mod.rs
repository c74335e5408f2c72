//! Image upload gateway.
//!
//! Validates size and type before any storage call, names objects so they
//! never collide, retries failed uploads, and removes replaced images on a
//! best-effort basis.

mod storage;

#[cfg(any(test, feature = "test-util"))]
pub use storage::MemoryStorage;
pub use storage::{ObjectStorage, StorageError, SupabaseStorage};

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Largest accepted upload (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Accepted image MIME types.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "image/bmp",
];

const RANDOM_SUFFIX_LEN: usize = 8;

/// A file received from the admin UI.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Outcome of a single upload. Serialized as `{success, url?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    #[must_use]
    pub const fn uploaded(url: String) -> Self {
        Self {
            success: true,
            url: Some(url),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a bulk delete. Serialized as `{success, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Both halves of a replace: removing the old object and storing the new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    /// `None` when there was no previous image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_removed: Option<bool>,
    #[serde(flatten)]
    pub upload: UploadResult,
}

/// How failed uploads are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same attempt count with no delay, for tests.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Check size and type of an upload.
///
/// # Errors
///
/// Returns a message suitable for the admin UI.
pub fn validate(file: &UploadFile) -> Result<(), String> {
    if file.bytes.is_empty() {
        return Err("File is empty".to_owned());
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err("File is too large. Maximum size is 5 MB".to_owned());
    }
    let content_type = normalized_content_type(&file.content_type);
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(format!(
            "Unsupported file type \"{content_type}\". Upload a JPEG, PNG, GIF, WebP, SVG or BMP image"
        ));
    }
    Ok(())
}

fn normalized_content_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or_default().trim().to_lowercase()
}

/// Lowercase a file name and collapse non-alphanumeric runs to `-`,
/// keeping the extension.
#[must_use]
pub fn sanitize_file_name(name: &str, content_type: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or_default().to_lowercase();
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name.as_str(), None),
    };

    let stem = collapse(stem);
    let stem = if stem.is_empty() { "image".to_owned() } else { stem };
    let ext = ext
        .map(|e| e.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|e| !e.is_empty())
        .or_else(|| extension_for(content_type).map(str::to_owned));

    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

fn collapse(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_owned()
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match normalized_content_type(content_type).as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

/// Build a collision-resistant object key:
/// `{unix_millis}-{8 random alphanumerics}-{sanitized name}`.
#[must_use]
pub fn object_key(file_name: &str, content_type: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!(
        "{millis}-{suffix}-{}",
        sanitize_file_name(file_name, content_type)
    )
}

/// Object key of a stored URL: its final path segment.
#[must_use]
pub fn key_from_url(url: &str) -> Option<String> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_owned())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_owned());
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
}

/// Upload gateway over an [`ObjectStorage`].
#[derive(Clone)]
pub struct UploadGateway {
    storage: Arc<dyn ObjectStorage>,
    retry: RetryPolicy,
}

impl UploadGateway {
    #[must_use]
    pub fn new(storage: Arc<dyn ObjectStorage>, retry: RetryPolicy) -> Self {
        Self { storage, retry }
    }

    /// Validate and store an image, retrying storage errors.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    pub async fn upload(&self, file: UploadFile) -> UploadResult {
        if let Err(message) = validate(&file) {
            return UploadResult::failed(message);
        }

        let content_type = normalized_content_type(&file.content_type);
        let key = object_key(&file.file_name, &content_type);
        let attempts = self.retry.attempts.max(1);

        for attempt in 1..=attempts {
            match self
                .storage
                .put(&key, &content_type, file.bytes.clone())
                .await
            {
                Ok(()) => {
                    info!(%key, attempt, "Image uploaded");
                    return UploadResult::uploaded(self.storage.public_url(&key));
                }
                Err(e) => {
                    warn!(%key, attempt, error = %e, "Image upload failed");
                    if attempt < attempts && !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        UploadResult::failed("Upload failed. Please try again.")
    }

    /// Upload a new image after trying to remove the one it replaces.
    ///
    /// A failed removal is logged and reported but never blocks the upload.
    /// Invalid files are rejected before anything is removed.
    pub async fn replace(&self, file: UploadFile, previous_url: Option<&str>) -> ReplaceOutcome {
        if let Err(message) = validate(&file) {
            return ReplaceOutcome {
                previous_removed: None,
                upload: UploadResult::failed(message),
            };
        }

        let previous_removed = match previous_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Some(self.delete_urls(&[url.to_owned()]).await.success),
            None => None,
        };

        ReplaceOutcome {
            previous_removed,
            upload: self.upload(file).await,
        }
    }

    /// Remove the objects behind `urls` in one storage call.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn delete_urls(&self, urls: &[String]) -> DeleteResult {
        let keys: Vec<String> = urls.iter().filter_map(|u| key_from_url(u)).collect();
        if keys.is_empty() {
            return DeleteResult {
                success: false,
                error: Some("No files to delete".to_owned()),
            };
        }

        match self.storage.remove(&keys).await {
            Ok(()) => {
                info!(count = keys.len(), "Images deleted");
                DeleteResult {
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Image delete failed");
                DeleteResult {
                    success: false,
                    error: Some("Failed to delete files".to_owned()),
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn png(len: usize) -> UploadFile {
        UploadFile {
            file_name: "Office Safe (Front).PNG".to_owned(),
            content_type: "image/png".to_owned(),
            bytes: Bytes::from(vec![0_u8; len]),
        }
    }

    fn gateway() -> (Arc<MemoryStorage>, UploadGateway) {
        let storage = Arc::new(MemoryStorage::new());
        let gateway = UploadGateway::new(storage.clone(), RetryPolicy::immediate());
        (storage, gateway)
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("Office Safe (Front).PNG", "image/png"),
            "office-safe-front.png"
        );
        assert_eq!(sanitize_file_name("C:\\tmp\\a__b.jpeg", "image/jpeg"), "a-b.jpeg");
        assert_eq!(sanitize_file_name("???", "image/webp"), "image.webp");
        assert_eq!(sanitize_file_name("logo", "image/svg+xml"), "logo.svg");
    }

    #[test]
    fn test_object_key_shape() {
        let key = object_key("Safe.png", "image/png");
        let mut parts = key.splitn(3, '-');
        let millis = parts.next().unwrap();
        let suffix = parts.next().unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts.next(), Some("safe.png"));
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url("https://x.supabase.co/storage/v1/object/public/images/1-a-b.png?v=2")
                .as_deref(),
            Some("1-a-b.png")
        );
        assert_eq!(key_from_url("https://x.supabase.co/"), None);
    }

    #[test]
    fn test_validate_boundaries() {
        assert!(validate(&png(MAX_UPLOAD_BYTES)).is_ok());
        assert!(validate(&png(MAX_UPLOAD_BYTES + 1)).is_err());
        assert!(validate(&png(0)).is_err());

        let mut file = png(10);
        file.content_type = "image/png; charset=binary".to_owned();
        assert!(validate(&file).is_ok());
    }

    #[tokio::test]
    async fn test_rejects_without_touching_storage() {
        let (storage, gateway) = gateway();

        let big = gateway.upload(png(6 * 1024 * 1024)).await;
        assert!(!big.success);

        let mut text = png(10);
        text.content_type = "text/plain".to_owned();
        let result = gateway.upload(text).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("text/plain"));

        assert_eq!(storage.calls(), 0);
    }

    #[tokio::test]
    async fn test_upload_retries_then_succeeds() {
        let (storage, gateway) = gateway();
        storage.fail_next_puts(2);

        let result = gateway.upload(png(10)).await;
        assert!(result.success);
        assert_eq!(storage.calls(), 3);
        assert!(result.url.unwrap().ends_with("-office-safe-front.png"));
    }

    #[tokio::test]
    async fn test_upload_gives_up_after_three_attempts() {
        let (storage, gateway) = gateway();
        storage.fail_next_puts(5);

        let result = gateway.upload(png(10)).await;
        assert_eq!(result, UploadResult::failed("Upload failed. Please try again."));
        assert_eq!(storage.calls(), 3);
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_replace_reports_failed_removal_but_uploads() {
        let (storage, gateway) = gateway();
        storage.set_fail_removes(true);

        let outcome = gateway
            .replace(png(10), Some("https://storage.test/old.png"))
            .await;
        assert_eq!(outcome.previous_removed, Some(false));
        assert!(outcome.upload.success);
        assert_eq!(storage.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_removes_previous_object() {
        let (storage, gateway) = gateway();
        let first = gateway.upload(png(10)).await.url.unwrap();

        let outcome = gateway.replace(png(20), Some(&first)).await;
        assert_eq!(outcome.previous_removed, Some(true));
        let keys = storage.keys();
        assert_eq!(keys.len(), 1);
        assert_ne!(Some(keys[0].clone()), key_from_url(&first));
    }

    #[tokio::test]
    async fn test_bulk_delete_is_all_or_nothing() {
        let (storage, gateway) = gateway();
        let a = gateway.upload(png(10)).await.url.unwrap();
        let b = gateway.upload(png(10)).await.url.unwrap();

        let deleted = gateway.delete_urls(&[a, b]).await;
        assert!(deleted.success);
        assert!(storage.keys().is_empty());

        storage.set_fail_removes(true);
        let failed = gateway
            .delete_urls(&["https://storage.test/x.png".to_owned()])
            .await;
        assert_eq!(failed.error.as_deref(), Some("Failed to delete files"));
    }

    #[test]
    fn test_replace_outcome_json_contract() {
        let outcome = ReplaceOutcome {
            previous_removed: None,
            upload: UploadResult::uploaded("https://storage.test/a.png".to_owned()),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"success": true, "url": "https://storage.test/a.png"})
        );
    }
}
