//! Admin dashboard route handlers.
//!
//! Every handler takes [`RequireAdmin`], so anonymous visitors are redirected
//! to `/auth` and signed-in non-admins get the access-denied page.

pub mod categories;
pub mod products;
pub mod uploads;
pub mod users;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use savers_core::{CategoryId, ProductId};

use super::products::or_empty;
use crate::actions::{ActionError, BatchItemResult};
use crate::filters;
use crate::middleware::{RequireAdmin, upload_rate_limiter};
use crate::models::{Product, ViewerView};
use crate::services::upload::MAX_UPLOAD_BYTES;
use crate::state::AppState;

/// Request body cap for the upload API; leaves room for multipart framing so
/// oversized files reach validation and get a readable error.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES * 2;

/// Products shown in the dashboard's "recently added" table.
const RECENT_PRODUCTS: usize = 5;

/// Batch delete form: one `ids` entry per checked row.
#[derive(Debug, Default, Deserialize)]
pub struct BatchDeleteForm {
    #[serde(default)]
    pub ids: Vec<i32>,
}

impl BatchDeleteForm {
    #[must_use]
    pub fn category_ids(&self) -> Vec<CategoryId> {
        self.ids.iter().copied().map(CategoryId::new).collect()
    }

    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.ids.iter().copied().map(ProductId::new).collect()
    }
}

/// Summarize a batch delete as a flash `(key, message)` pair.
pub(crate) fn batch_summary<Id: std::fmt::Display>(
    results: &[BatchItemResult<Id>],
    noun: &str,
) -> (&'static str, String) {
    if results.is_empty() {
        return ("error", format!("Select at least one {noun} to delete"));
    }

    let deleted = results.iter().filter(|r| r.success).count();
    let failures: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| format!("#{}: {}", r.id, r.error.as_deref().unwrap_or("failed")))
        .collect();

    if failures.is_empty() {
        ("notice", format!("Deleted {deleted} {noun}(s)"))
    } else {
        (
            "error",
            format!(
                "Deleted {deleted} of {} {noun}(s). Failed {}",
                results.len(),
                failures.join("; ")
            ),
        )
    }
}

/// HTTP status for a failed form submission.
pub(crate) const fn form_status(err: &ActionError) -> StatusCode {
    match err {
        ActionError::Validation(_) => StatusCode::BAD_REQUEST,
        ActionError::Conflict(_) => StatusCode::CONFLICT,
        ActionError::NotFound(_) => StatusCode::NOT_FOUND,
        ActionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log a failed admin write; storage failures are errors, the rest warnings.
pub(crate) fn log_failure(err: &ActionError, action: &str) {
    if matches!(err, ActionError::Storage(_)) {
        tracing::error!(error = %err, "{action} failed");
    } else {
        tracing::warn!(error = %err, "{action} rejected");
    }
}

/// Recently added product row.
#[derive(Debug, Clone)]
pub struct RecentProductRow {
    pub id: i32,
    pub name: String,
    pub category: String,
    pub added: String,
}

/// Dashboard metrics.
#[derive(Debug, Clone, Default)]
pub struct DashboardMetrics {
    pub categories: usize,
    pub products: usize,
    pub users: u64,
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub viewer: ViewerView,
    pub current_path: &'static str,
    pub metrics: DashboardMetrics,
    pub recent_products: Vec<RecentProductRow>,
}

/// Admin dashboard.
#[instrument(skip_all)]
pub async fn dashboard(admin: RequireAdmin, State(state): State<AppState>) -> DashboardTemplate {
    let categories = state.categories();
    let products = state.products();
    let users = state.users();
    let (categories, products, users) =
        tokio::join!(categories.list(), products.list(), users.list(None, 1));

    let categories = or_empty(categories, "categories");
    let products: Vec<Product> = or_empty(products, "products");
    let user_total = users.map(|page| page.total).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to count users");
        0
    });

    let recent_products = products
        .iter()
        .take(RECENT_PRODUCTS)
        .map(|p| RecentProductRow {
            id: p.id.as_i32(),
            name: p.name.clone(),
            category: categories
                .iter()
                .find(|c| c.id == p.category_id)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            added: p.created_at.format("%b %-d, %Y").to_string(),
        })
        .collect();

    DashboardTemplate {
        viewer: admin.viewer,
        current_path: "/admin",
        metrics: DashboardMetrics {
            categories: categories.len(),
            products: products.len(),
            users: user_total,
        },
        recent_products,
    }
}

/// JSON API used by the admin forms.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(uploads::upload))
        .route("/uploads/delete", post(uploads::delete))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(upload_rate_limiter())
}

/// Create the admin router, mounted at `/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route(
            "/categories",
            get(categories::index).post(categories::create),
        )
        .route("/categories/new", get(categories::new_form))
        .route("/categories/delete", post(categories::delete_many))
        .route("/categories/{id}", post(categories::update))
        .route("/categories/{id}/edit", get(categories::edit_form))
        .route("/categories/{id}/delete", post(categories::delete))
        .route("/products", get(products::index).post(products::create))
        .route("/products/new", get(products::new_form))
        .route("/products/delete", post(products::delete_many))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit_form))
        .route("/products/{id}/delete", post(products::delete))
        .route("/users", get(users::index).post(users::create))
        .route("/users/{id}", get(users::show))
        .route("/users/{id}/role", post(users::set_role))
        .route("/users/{id}/ban", post(users::ban))
        .route("/users/{id}/unban", post(users::unban))
        .route("/users/{id}/password", post(users::set_password))
        .route("/users/{id}/revoke-sessions", post(users::revoke_sessions))
        .route("/users/{id}/delete", post(users::delete))
        .nest("/api", api_routes())
}
