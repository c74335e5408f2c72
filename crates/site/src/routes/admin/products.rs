//! Product management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use savers_core::{CategoryId, ProductId};

use super::{BatchDeleteForm, batch_summary, form_status, log_failure};
use crate::actions::products::{
    parse_feature_lines, parse_specification_lines, specification_lines,
};
use crate::actions::{ActionError, ProductDraft};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::{Category, Product, ViewerView};
use crate::routes::products::or_empty;
use crate::routes::{FlashQuery, redirect_with};
use crate::state::AppState;

const LIST_PATH: &str = "/admin/products";

/// Raw product form fields. Features are one per line, specifications are
/// `Name: Value` lines.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFormInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub key_features: String,
    #[serde(default)]
    pub specifications: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub brochure_url: String,
}

impl ProductFormInput {
    /// Parse the text fields into a draft for validation.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for a malformed category id or
    /// specification line.
    pub fn to_draft(&self) -> std::result::Result<ProductDraft, ActionError> {
        let category_id = match self.category_id.trim() {
            "" => None,
            raw => Some(raw.parse::<CategoryId>().map_err(|_| {
                ActionError::Validation("Select a valid category".to_owned())
            })?),
        };

        Ok(ProductDraft {
            name: self.name.clone(),
            model: Some(self.model.clone()),
            description: self.description.clone(),
            category_id,
            key_features: parse_feature_lines(&self.key_features),
            specifications: parse_specification_lines(&self.specifications)?,
            image: self.image.clone(),
            brochure_url: Some(self.brochure_url.clone()),
        })
    }

    fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            model: product.model.clone().unwrap_or_default(),
            description: product.description.clone(),
            category_id: product.category_id.to_string(),
            key_features: product.key_features.join("\n"),
            specifications: specification_lines(&product.specifications),
            image: product.image.clone(),
            brochure_url: product.brochure_url.clone().unwrap_or_default(),
        }
    }
}

/// Category choice in the product form.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: String,
    pub name: String,
}

/// Product row for the admin list.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: i32,
    pub name: String,
    pub model: String,
    pub category: String,
    pub image: String,
    pub updated: String,
}

/// Product list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/index.html")]
pub struct ProductsIndexTemplate {
    pub viewer: ViewerView,
    pub current_path: &'static str,
    pub products: Vec<ProductRow>,
    pub categories: Vec<CategoryOption>,
    pub filter: Option<String>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Product create/edit form template.
#[derive(Template)]
#[template(path = "admin/products/form.html")]
pub struct ProductFormTemplate {
    pub viewer: ViewerView,
    pub current_path: &'static str,
    pub title: String,
    pub action: String,
    pub form: ProductFormInput,
    pub categories: Vec<CategoryOption>,
    pub error: Option<String>,
}

impl ProductFormTemplate {
    fn respond(self, err: Option<&ActionError>) -> Response {
        let status = err.map_or(StatusCode::OK, form_status);
        match self.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => AppError::Internal(format!("template render failed: {e}")).into_response(),
        }
    }
}

fn category_options(categories: &[Category]) -> Vec<CategoryOption> {
    categories
        .iter()
        .map(|c| CategoryOption {
            id: c.id.to_string(),
            name: c.name.clone(),
        })
        .collect()
}

async fn load_options(state: &AppState) -> Vec<CategoryOption> {
    category_options(&or_empty(state.categories().list().await, "categories"))
}

/// Optional category filter on the product list.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Product list, optionally filtered by category.
#[instrument(skip_all)]
pub async fn index(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ProductsIndexTemplate {
    let filter = query
        .category
        .as_deref()
        .and_then(|raw| raw.trim().parse::<CategoryId>().ok());

    let categories = state.categories();
    let products = state.products();
    let listed = async {
        match filter {
            Some(id) => products.list_by_category(id).await,
            None => products.list().await,
        }
    };
    let (all_categories, listed) = tokio::join!(categories.list(), listed);
    let all_categories = or_empty(all_categories, "categories");

    let flash = FlashQuery {
        notice: query.notice,
        error: query.error,
    };
    let (listed, error) = match listed {
        Ok(products) => (products, flash.error),
        Err(e) => {
            log_failure(&e, "Listing products");
            (Vec::new(), Some(e.user_message()))
        }
    };

    let rows = listed
        .iter()
        .map(|p| ProductRow {
            id: p.id.as_i32(),
            name: p.name.clone(),
            model: p.model.clone().unwrap_or_default(),
            category: all_categories
                .iter()
                .find(|c| c.id == p.category_id)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            image: p.image.clone(),
            updated: p.updated_at.format("%b %-d, %Y").to_string(),
        })
        .collect();

    ProductsIndexTemplate {
        viewer: admin.viewer,
        current_path: LIST_PATH,
        products: rows,
        categories: category_options(&all_categories),
        filter: filter.map(|id| id.to_string()),
        notice: flash.notice,
        error,
    }
}

/// Empty create form.
pub async fn new_form(admin: RequireAdmin, State(state): State<AppState>) -> Response {
    ProductFormTemplate {
        viewer: admin.viewer,
        current_path: LIST_PATH,
        title: "New product".to_owned(),
        action: LIST_PATH.to_owned(),
        form: ProductFormInput::default(),
        categories: load_options(&state).await,
        error: None,
    }
    .respond(None)
}

/// Create a product.
#[instrument(skip_all)]
pub async fn create(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Form(form): Form<ProductFormInput>,
) -> Response {
    let result = match form.to_draft() {
        Ok(draft) => state.products().create(&draft).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(product) => {
            redirect_with(LIST_PATH, "notice", &format!("Created \"{}\"", product.name))
                .into_response()
        }
        Err(e) => {
            log_failure(&e, "Creating product");
            ProductFormTemplate {
                viewer: admin.viewer,
                current_path: LIST_PATH,
                title: "New product".to_owned(),
                action: LIST_PATH.to_owned(),
                form,
                categories: load_options(&state).await,
                error: Some(e.user_message()),
            }
            .respond(Some(&e))
        }
    }
}

/// Edit form for an existing product.
///
/// # Errors
///
/// Returns 404 if the product doesn't exist.
#[instrument(skip(admin, state))]
pub async fn edit_form(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Response> {
    let products = state.products();
    let (product, categories) = tokio::join!(products.get(id), load_options(&state));
    let product = product?.ok_or_else(|| AppError::NotFound("Product".to_owned()))?;

    Ok(ProductFormTemplate {
        viewer: admin.viewer,
        current_path: LIST_PATH,
        title: format!("Edit {}", product.name),
        action: format!("{LIST_PATH}/{id}"),
        form: ProductFormInput::from_product(&product),
        categories,
        error: None,
    }
    .respond(None))
}

/// Update a product.
#[instrument(skip(admin, state, form))]
pub async fn update(
    admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductFormInput>,
) -> Response {
    let result = match form.to_draft() {
        Ok(draft) => state.products().update(id, &draft).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(product) => {
            redirect_with(LIST_PATH, "notice", &format!("Updated \"{}\"", product.name))
                .into_response()
        }
        Err(e) => {
            log_failure(&e, "Updating product");
            ProductFormTemplate {
                viewer: admin.viewer,
                current_path: LIST_PATH,
                title: "Edit product".to_owned(),
                action: format!("{LIST_PATH}/{id}"),
                form,
                categories: load_options(&state).await,
                error: Some(e.user_message()),
            }
            .respond(Some(&e))
        }
    }
}

/// Delete a product.
#[instrument(skip(_admin, state))]
pub async fn delete(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Response {
    match state.products().delete(id).await {
        Ok(()) => redirect_with(LIST_PATH, "notice", "Product deleted").into_response(),
        Err(e) => {
            log_failure(&e, "Deleting product");
            redirect_with(LIST_PATH, "error", &e.user_message()).into_response()
        }
    }
}

/// Delete every checked product.
#[instrument(skip_all)]
pub async fn delete_many(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    axum_extra::extract::Form(form): axum_extra::extract::Form<BatchDeleteForm>,
) -> Response {
    let results = state.products().delete_many(&form.product_ids()).await;
    let (key, message) = batch_summary(&results, "product");
    redirect_with(LIST_PATH, key, &message).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_to_draft_parses_text_fields() {
        let form = ProductFormInput {
            name: "Fire Safe 120".to_owned(),
            category_id: " 4 ".to_owned(),
            key_features: "Fireproof 2h\n\n Digital lock ".to_owned(),
            specifications: "Weight: 80 kg\nHeight: 60 cm".to_owned(),
            ..ProductFormInput::default()
        };
        let draft = form.to_draft().unwrap();
        assert_eq!(draft.category_id, Some(CategoryId::new(4)));
        assert_eq!(draft.key_features, vec!["Fireproof 2h", "Digital lock"]);
        assert_eq!(draft.specifications.len(), 2);
    }

    #[test]
    fn test_form_to_draft_rejects_bad_category() {
        let form = ProductFormInput {
            category_id: "safes".to_owned(),
            ..ProductFormInput::default()
        };
        assert!(matches!(form.to_draft(), Err(ActionError::Validation(_))));
    }

    #[test]
    fn test_blank_category_left_for_validation() {
        let draft = ProductFormInput::default().to_draft().unwrap();
        assert_eq!(draft.category_id, None);
        assert!(draft.validate().is_err());
    }
}
