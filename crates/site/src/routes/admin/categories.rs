//! Category management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tracing::instrument;

use savers_core::CategoryId;

use super::{BatchDeleteForm, batch_summary, form_status, log_failure};
use crate::actions::{ActionError, CategoryForm};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::{Category, ViewerView};
use crate::routes::products::or_empty;
use crate::routes::{FlashQuery, redirect_with};
use crate::state::AppState;

const LIST_PATH: &str = "/admin/categories";

/// Category row for the admin list.
#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub product_count: usize,
    pub updated: String,
}

/// Category list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub viewer: ViewerView,
    pub current_path: &'static str,
    pub categories: Vec<CategoryRow>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Category create/edit form template.
#[derive(Template)]
#[template(path = "admin/categories/form.html")]
pub struct CategoryFormTemplate {
    pub viewer: ViewerView,
    pub current_path: &'static str,
    pub title: String,
    pub action: String,
    pub form: CategoryForm,
    pub error: Option<String>,
}

impl CategoryFormTemplate {
    fn new_category(viewer: ViewerView, form: CategoryForm, error: Option<String>) -> Self {
        Self {
            viewer,
            current_path: LIST_PATH,
            title: "New category".to_owned(),
            action: LIST_PATH.to_owned(),
            form,
            error,
        }
    }

    fn edit_category(
        viewer: ViewerView,
        id: CategoryId,
        form: CategoryForm,
        error: Option<String>,
    ) -> Self {
        Self {
            viewer,
            current_path: LIST_PATH,
            title: "Edit category".to_owned(),
            action: format!("{LIST_PATH}/{id}"),
            form,
            error,
        }
    }

    /// Render with the status matching `err`, or 200 when there is none.
    fn respond(self, err: Option<&ActionError>) -> Response {
        let status = err.map_or(axum::http::StatusCode::OK, form_status);
        match self.render() {
            Ok(html) => (status, axum::response::Html(html)).into_response(),
            Err(e) => AppError::Internal(format!("template render failed: {e}")).into_response(),
        }
    }
}

fn form_from(category: &Category) -> CategoryForm {
    CategoryForm {
        name: category.name.clone(),
        image: category.image.clone(),
    }
}

/// Category list with product counts.
#[instrument(skip_all)]
pub async fn index(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Query(flash): Query<FlashQuery>,
) -> CategoriesIndexTemplate {
    let categories = state.categories();
    let products = state.products();
    let (listed, all_products) = tokio::join!(categories.list(), products.list());

    let all_products = or_empty(all_products, "products");
    let (categories, error) = match listed {
        Ok(categories) => (categories, flash.error),
        Err(e) => {
            log_failure(&e, "Listing categories");
            (Vec::new(), Some(e.user_message()))
        }
    };

    let rows = categories
        .iter()
        .map(|c| CategoryRow {
            id: c.id.as_i32(),
            name: c.name.clone(),
            image: c.image.clone(),
            product_count: all_products
                .iter()
                .filter(|p| p.category_id == c.id)
                .count(),
            updated: c.updated_at.format("%b %-d, %Y").to_string(),
        })
        .collect();

    CategoriesIndexTemplate {
        viewer: admin.viewer,
        current_path: LIST_PATH,
        categories: rows,
        notice: flash.notice,
        error,
    }
}

/// Empty create form.
pub async fn new_form(admin: RequireAdmin) -> Response {
    CategoryFormTemplate::new_category(admin.viewer, CategoryForm::default(), None).respond(None)
}

/// Create a category.
#[instrument(skip_all)]
pub async fn create(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<CategoryForm>,
) -> Response {
    match state.categories().create(&form).await {
        Ok(category) => {
            redirect_with(LIST_PATH, "notice", &format!("Created \"{}\"", category.name))
                .into_response()
        }
        Err(e) => {
            log_failure(&e, "Creating category");
            let message = e.user_message();
            CategoryFormTemplate::new_category(admin.viewer, form, Some(message)).respond(Some(&e))
        }
    }
}

/// Edit form for an existing category.
///
/// # Errors
///
/// Returns 404 if the category doesn't exist.
#[instrument(skip(admin, state))]
pub async fn edit_form(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Response> {
    let category = state
        .categories()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_owned()))?;

    Ok(
        CategoryFormTemplate::edit_category(admin.viewer, id, form_from(&category), None)
            .respond(None),
    )
}

/// Update a category.
#[instrument(skip(admin, state, form))]
pub async fn update(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Form(form): Form<CategoryForm>,
) -> Response {
    match state.categories().update(id, &form).await {
        Ok(category) => {
            redirect_with(LIST_PATH, "notice", &format!("Updated \"{}\"", category.name))
                .into_response()
        }
        Err(e) => {
            log_failure(&e, "Updating category");
            let message = e.user_message();
            CategoryFormTemplate::edit_category(admin.viewer, id, form, Some(message))
                .respond(Some(&e))
        }
    }
}

/// Delete a category and, by cascade, its products.
#[instrument(skip(_admin, state))]
pub async fn delete(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Response {
    match state.categories().delete(id).await {
        Ok(()) => redirect_with(LIST_PATH, "notice", "Category deleted").into_response(),
        Err(e) => {
            log_failure(&e, "Deleting category");
            redirect_with(LIST_PATH, "error", &e.user_message()).into_response()
        }
    }
}

/// Delete every checked category.
#[instrument(skip_all)]
pub async fn delete_many(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    axum_extra::extract::Form(form): axum_extra::extract::Form<BatchDeleteForm>,
) -> Response {
    let results = state.categories().delete_many(&form.category_ids()).await;
    let (key, message) = batch_summary(&results, "category");
    redirect_with(LIST_PATH, key, &message).into_response()
}
