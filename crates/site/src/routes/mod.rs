//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                              - Home page
//! GET  /about | /clients | /contact   - Marketing pages
//! GET  /health | /health/ready        - Liveness and readiness
//!
//! # Catalog
//! GET  /products                      - Category grid
//! GET  /products/category/{id}        - Products in a category
//! GET  /products/{id}                 - Product detail
//!
//! # Auth
//! GET  /auth                          - Sign-in / sign-up page
//! POST /auth/sign-in                  - Sign in (rate limited)
//! POST /auth/sign-up                  - Create account (rate limited)
//! POST /auth/sign-out                 - Sign out
//!
//! # Admin (admin role required)
//! GET  /admin                         - Dashboard
//! GET  /admin/categories              - Category list
//! GET  /admin/categories/new          - New category form
//! POST /admin/categories              - Create category
//! GET  /admin/categories/{id}/edit    - Edit category form
//! POST /admin/categories/{id}         - Update category
//! POST /admin/categories/{id}/delete  - Delete category
//! POST /admin/categories/delete       - Batch delete categories
//! (same shape under /admin/products)
//! GET  /admin/users                   - User list with search
//! POST /admin/users                   - Create user
//! GET  /admin/users/{id}              - User detail with sessions
//! POST /admin/users/{id}/role|ban|unban|password|revoke-sessions|delete
//! POST /admin/api/uploads             - Upload an image (JSON)
//! POST /admin/api/uploads/delete      - Delete uploaded images (JSON)
//! ```

pub mod admin;
pub mod auth;
pub mod health;
pub mod home;
pub mod pages;
pub mod products;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Flash message carried across a redirect in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Redirect to `path` with a flash message.
pub(crate) fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(key, message)
        .finish();
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{path}{separator}{query}"))
}

/// Create the catalog routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/category/{id}", get(products::category))
        .route("/{id}", get(products::show))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/sign-in", post(auth::sign_in))
        .route("/sign-up", post(auth::sign_up))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/", get(auth::page))
        .route("/sign-out", post(auth::sign_out))
        .merge(limited)
}

/// Create all routes for the site.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/about", get(pages::about))
        .route("/clients", get(pages::clients))
        .route("/contact", get(pages::contact))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin::routes())
}
