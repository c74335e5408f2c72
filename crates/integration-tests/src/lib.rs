//! Integration tests for Savers.
//!
//! Every test runs the real actions, auth service and router over the
//! in-memory catalog, identity and object stores, so no database or storage
//! bucket is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p savers-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog` - Category and product actions, cascade and cache behaviour
//! - `uploads` - Upload validation and storage calls
//! - `access` - Auth gating for pages, the admin shell and the JSON API

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use tower::ServiceExt;

use savers_core::{CategoryId, ProductId, Role};
use savers_site::actions::{CategoryForm, ProductDraft};
use savers_site::db::MemoryStore;
use savers_site::services::auth::ClientMeta;
use savers_site::services::upload::MemoryStorage;
use savers_site::state::AppState;

/// Password used for every seeded user.
pub const PASSWORD: &str = "correct horse battery";

/// Everything a test needs: state plus handles on the fake backends.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub storage: Arc<MemoryStorage>,
    pub state: AppState,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(MemoryStorage::new());
        let state = AppState::in_memory(store.clone(), storage.clone());
        Self {
            store,
            storage,
            state,
        }
    }

    /// The full site router over this context's state.
    #[must_use]
    pub fn router(&self) -> Router {
        savers_site::app(self.state.clone())
    }

    /// Create a category, panicking on failure.
    pub async fn category(&self, name: &str) -> CategoryId {
        self.state
            .categories()
            .create(&CategoryForm {
                name: name.to_owned(),
                image: format!("https://storage.test/images/{}.png", name.to_lowercase()),
            })
            .await
            .unwrap()
            .id
    }

    /// Create a product in `category`, panicking on failure.
    pub async fn product(&self, category: CategoryId, name: &str) -> ProductId {
        self.state
            .products()
            .create(&product_draft(category, name))
            .await
            .unwrap()
            .id
    }

    /// Create a user with `role` and return a session token for them.
    pub async fn session_token(&self, email: &str, role: Role) -> String {
        let auth = self.state.auth();
        auth.create_user("Test User", email, PASSWORD, role)
            .await
            .unwrap();
        auth.sign_in(email, PASSWORD, &ClientMeta::default())
            .await
            .unwrap()
            .session
            .token
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }
}

/// A valid draft for a product in `category`.
#[must_use]
pub fn product_draft(category: CategoryId, name: &str) -> ProductDraft {
    ProductDraft {
        name: name.to_owned(),
        model: Some("SV-100".to_owned()),
        description: "Two-hour fire rated safe.".to_owned(),
        category_id: Some(category),
        key_features: vec!["Fireproof".to_owned()],
        specifications: vec![("Weight".to_owned(), "80 kg".to_owned())],
        image: "https://storage.test/images/safe.png".to_owned(),
        brochure_url: None,
    }
}

/// GET `uri`, optionally as the holder of `token`.
#[must_use]
pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Form POST to `uri`. Rate-limited routes need a client address.
#[must_use]
pub fn post_form(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.7");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

/// Response body as text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}
