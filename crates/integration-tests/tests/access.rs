//! Auth gating for public pages, the admin shell and the admin API.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;

use savers_core::Role;
use savers_integration_tests::{PASSWORD, TestContext, body_text, get, location, post_form};
use savers_site::services::auth::{AccessError, AuthService, ClientMeta};

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn test_require_auth_and_admin() {
    let ctx = TestContext::new();
    let auth = ctx.state.auth();
    auth.create_user("Reader", "reader@savers.test", PASSWORD, Role::User)
        .await
        .unwrap();
    let reader = auth
        .sign_in("reader@savers.test", PASSWORD, &ClientMeta::default())
        .await
        .unwrap();

    assert_eq!(
        AuthService::require_auth(None).unwrap_err(),
        AccessError::Unauthenticated
    );
    assert!(AuthService::require_auth(Some(reader.clone())).is_ok());
    assert_eq!(
        AuthService::require_admin(None).unwrap_err(),
        AccessError::Unauthenticated
    );
    assert_eq!(
        AuthService::require_admin(Some(reader)).unwrap_err(),
        AccessError::NotAdmin
    );
}

// =============================================================================
// Admin Shell
// =============================================================================

#[tokio::test]
async fn test_anonymous_admin_request_redirected_to_sign_in() {
    let ctx = TestContext::new();
    let response = ctx.send(get("/admin/categories", None)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth");
}

#[tokio::test]
async fn test_non_admin_sees_access_denied() {
    let ctx = TestContext::new();
    let token = ctx.session_token("reader@savers.test", Role::User).await;

    let response = ctx.send(get("/admin", Some(&token))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_text(response).await.contains("Access denied"));
}

#[tokio::test]
async fn test_admin_sees_dashboard() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;
    ctx.category("Safes").await;

    let response = ctx.send(get("/admin", Some(&token))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Dashboard"));
    assert!(html.contains("Test User"));
}

#[tokio::test]
async fn test_admin_lists_render() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;
    let safes = ctx.category("Safes").await;
    ctx.product(safes, "Fire Safe 120").await;

    for path in ["/admin/categories", "/admin/products", "/admin/users"] {
        let response = ctx.send(get(path, Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn test_banned_user_loses_session() {
    let ctx = TestContext::new();
    let admin_token = ctx.session_token("admin@savers.test", Role::Admin).await;
    let reader_token = ctx.session_token("reader@savers.test", Role::User).await;
    let reader = ctx
        .state
        .auth()
        .get_session(&reader_token)
        .await
        .unwrap()
        .user;

    let response = ctx
        .send(post_form(
            &format!("/admin/users/{}/ban", reader.id),
            Some(&admin_token),
            "reason=Spam&days=",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("notice="));

    assert!(ctx.state.auth().get_session(&reader_token).await.is_none());
}

// =============================================================================
// Admin Forms
// =============================================================================

#[tokio::test]
async fn test_create_category_via_form() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;

    let response = ctx
        .send(post_form(
            "/admin/categories",
            Some(&token),
            "name=Vault+Doors&image=https%3A%2F%2Fstorage.test%2Fdoor.png",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/admin/categories?notice="));
    let listed = ctx.state.categories().list().await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_invalid_category_form_rerenders_with_error() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;

    let response = ctx
        .send(post_form("/admin/categories", Some(&token), "name=&image="))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("flash-error"));
}

#[tokio::test]
async fn test_batch_delete_via_form() {
    let ctx = TestContext::new();
    let token = ctx.session_token("admin@savers.test", Role::Admin).await;
    let safes = ctx.category("Safes").await;
    let lockers = ctx.category("Lockers").await;

    let response = ctx
        .send(post_form(
            "/admin/categories/delete",
            Some(&token),
            &format!("ids={safes}&ids={lockers}"),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(ctx.state.categories().list().await.unwrap().is_empty());
}

// =============================================================================
// Admin API
// =============================================================================

#[tokio::test]
async fn test_api_requires_session() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .method("POST")
        .uri("/admin/api/uploads/delete")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(r#"{"urls":[]}"#))
        .unwrap();

    let response = ctx.send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["success"], false);
}

// =============================================================================
// Sign-in Flow
// =============================================================================

#[tokio::test]
async fn test_sign_in_sets_cookie_and_lands_admin_on_dashboard() {
    let ctx = TestContext::new();
    ctx.state
        .auth()
        .create_user("Admin", "admin@savers.test", PASSWORD, Role::Admin)
        .await
        .unwrap();

    let response = ctx
        .send(post_form(
            "/auth/sign-in",
            None,
            "email=admin%40savers.test&password=correct+horse+battery",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("savers_session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_wrong_password_redirects_back_with_error() {
    let ctx = TestContext::new();
    ctx.session_token("reader@savers.test", Role::User).await;

    let response = ctx
        .send(post_form(
            "/auth/sign-in",
            None,
            "email=reader%40savers.test&password=nope-nope-nope",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth?mode=sign-in&error="));
}

#[tokio::test]
async fn test_sign_up_creates_regular_user() {
    let ctx = TestContext::new();

    let response = ctx
        .send(post_form(
            "/auth/sign-up",
            None,
            "name=New+Person&email=new%40savers.test&password=long+enough+pw&password_confirm=long+enough+pw",
        ))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let users = ctx.state.users().list(None, 1).await.unwrap();
    assert_eq!(users.total, 1);
    assert!(!users.users.first().unwrap().is_admin());
}

// =============================================================================
// Public Pages
// =============================================================================

#[tokio::test]
async fn test_public_pages_render_anonymously() {
    let ctx = TestContext::new();
    let safes = ctx.category("Safes").await;
    let product_id = ctx.product(safes, "Fire Safe 120").await;

    for path in [
        "/".to_owned(),
        "/about".to_owned(),
        "/clients".to_owned(),
        "/contact".to_owned(),
        "/products".to_owned(),
        format!("/products/category/{safes}"),
        format!("/products/{product_id}"),
        "/health".to_owned(),
    ] {
        let response = ctx.send(get(&path, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let ctx = TestContext::new();
    let response = ctx.send(get("/products/404", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
