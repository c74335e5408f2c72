//! Image uploads through the gateway and the admin JSON API.

#![allow(clippy::unwrap_used)]

use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;

use savers_core::Role;
use savers_integration_tests::{TestContext, body_text};
use savers_site::services::upload::{MAX_UPLOAD_BYTES, UploadFile};

const BOUNDARY: &str = "savers-test-boundary";

fn file(content_type: &str, len: usize) -> UploadFile {
    UploadFile {
        file_name: "Vault Door.png".to_owned(),
        content_type: content_type.to_owned(),
        bytes: Bytes::from(vec![7_u8; len]),
    }
}

/// Multipart upload request with an optional `previous_url` field.
fn upload_request(token: &str, content_type: &str, len: usize, previous: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(previous) = previous {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"previous_url\"\r\n\r\n{previous}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"door.png\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend(std::iter::repeat_n(7_u8, len));
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/admin/api/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from(body))
        .unwrap()
}

// =============================================================================
// Gateway
// =============================================================================

#[tokio::test]
async fn test_oversized_file_rejected_without_storage_call() {
    let ctx = TestContext::new();
    let result = ctx
        .state
        .uploads()
        .upload(file("image/png", 6 * 1024 * 1024))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("5 MB"));
    assert_eq!(ctx.storage.calls(), 0);
}

#[tokio::test]
async fn test_non_image_rejected_without_storage_call() {
    let ctx = TestContext::new();
    let result = ctx.state.uploads().upload(file("text/plain", 128)).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("Unsupported file type"));
    assert_eq!(ctx.storage.calls(), 0);
}

#[tokio::test]
async fn test_upload_at_limit_stored_with_public_url() {
    let ctx = TestContext::new();
    let result = ctx
        .state
        .uploads()
        .upload(file("image/png", MAX_UPLOAD_BYTES))
        .await;

    assert!(result.success);
    let url = result.url.unwrap();
    assert!(url.starts_with("https://storage.test/storage/v1/object/public/images/"));
    let keys = ctx.storage.keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(
        ctx.storage.content_type(keys.first().unwrap()).as_deref(),
        Some("image/png")
    );
}

#[tokio::test]
async fn test_transient_storage_failure_retried() {
    let ctx = TestContext::new();
    ctx.storage.fail_next_puts(1);

    let result = ctx.state.uploads().upload(file("image/webp", 64)).await;

    assert!(result.success);
    assert_eq!(ctx.storage.calls(), 2);
}

#[tokio::test]
async fn test_replace_removes_previous_image() {
    let ctx = TestContext::new();
    let first = ctx.state.uploads().upload(file("image/png", 64)).await;
    let first_url = first.url.unwrap();

    let outcome = ctx
        .state
        .uploads()
        .replace(file("image/jpeg", 64), Some(&first_url))
        .await;

    assert!(outcome.upload.success);
    assert_eq!(outcome.previous_removed, Some(true));
    assert_eq!(ctx.storage.keys().len(), 1);
}

#[tokio::test]
async fn test_failed_removal_does_not_block_replacement() {
    let ctx = TestContext::new();
    let first_url = ctx
        .state
        .uploads()
        .upload(file("image/png", 64))
        .await
        .url
        .unwrap();
    ctx.storage.set_fail_removes(true);

    let outcome = ctx
        .state
        .uploads()
        .replace(file("image/png", 64), Some(&first_url))
        .await;

    assert!(outcome.upload.success);
    assert_eq!(outcome.previous_removed, Some(false));
}

// =============================================================================
// JSON API
// =============================================================================

#[tokio::test]
async fn test_api_upload_returns_url() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;

    let response = ctx.send(upload_request(&token, "image/png", 256, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["url"].as_str().unwrap().contains("/images/"));
}

#[tokio::test]
async fn test_api_rejects_oversized_file_with_message() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;

    let response = ctx
        .send(upload_request(&token, "image/png", 6 * 1024 * 1024, None))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("5 MB"));
    assert_eq!(ctx.storage.calls(), 0);
}

#[tokio::test]
async fn test_api_replace_reports_previous_removal() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;
    let previous = ctx
        .state
        .uploads()
        .upload(file("image/png", 64))
        .await
        .url
        .unwrap();

    let response = ctx
        .send(upload_request(&token, "image/gif", 64, Some(&previous)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["previous_removed"], true);
}

#[tokio::test]
async fn test_api_upload_requires_admin() {
    let ctx = TestContext::new();
    let token = ctx.session_token("user@savers.test", Role::User).await;

    let response = ctx.send(upload_request(&token, "image/png", 64, None)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(ctx.storage.calls(), 0);
}
