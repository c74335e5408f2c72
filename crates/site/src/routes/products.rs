//! Public catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use tracing::instrument;

use savers_core::{CategoryId, ProductId};

use crate::actions::ActionError;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::CurrentSession;
use crate::models::{Category, Product, ViewerView};
use crate::state::AppState;

/// Number of key features shown on product cards.
const CARD_HIGHLIGHTS: usize = 3;
/// Number of related products on a detail page.
const RELATED_LIMIT: usize = 4;

/// Category display data for templates.
#[derive(Debug, Clone)]
pub struct CategoryCard {
    pub id: i32,
    pub name: String,
    pub image: String,
}

impl From<&Category> for CategoryCard {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.as_i32(),
            name: category.name.clone(),
            image: category.image.clone(),
        }
    }
}

/// Product card data for listings.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: i32,
    pub name: String,
    pub model: Option<String>,
    pub image: String,
    pub highlights: Vec<String>,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name.clone(),
            model: product.model.clone(),
            image: product.image.clone(),
            highlights: product.highlights(CARD_HIGHLIGHTS).to_vec(),
        }
    }
}

/// Product detail data.
#[derive(Debug, Clone)]
pub struct ProductDetailView {
    pub id: i32,
    pub name: String,
    pub model: Option<String>,
    pub description: String,
    pub image: String,
    pub key_features: Vec<String>,
    pub specifications: Vec<(String, String)>,
    pub brochure_url: Option<String>,
}

impl From<Product> for ProductDetailView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.as_i32(),
            name: product.name,
            model: product.model,
            description: product.description,
            image: product.image,
            key_features: product.key_features,
            specifications: product.specifications.into_iter().collect(),
            brochure_url: product.brochure_url,
        }
    }
}

/// Public pages render an empty section rather than fail on a read error.
pub(crate) fn or_empty<T>(result: std::result::Result<Vec<T>, ActionError>, what: &str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load {what}");
        Vec::new()
    })
}

/// Category grid template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub viewer: Option<ViewerView>,
    pub categories: Vec<CategoryCard>,
}

/// Products of one category.
#[derive(Template, WebTemplate)]
#[template(path = "products/category.html")]
pub struct CategoryTemplate {
    pub viewer: Option<ViewerView>,
    pub category: CategoryCard,
    pub products: Vec<ProductCard>,
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub viewer: Option<ViewerView>,
    pub product: ProductDetailView,
    pub category: Option<CategoryCard>,
    pub related: Vec<ProductCard>,
}

/// Display the category grid.
#[instrument(skip_all)]
pub async fn index(session: CurrentSession, State(state): State<AppState>) -> ProductsIndexTemplate {
    let categories = or_empty(state.categories().list().await, "categories");

    ProductsIndexTemplate {
        viewer: session.viewer(),
        categories: categories.iter().map(CategoryCard::from).collect(),
    }
}

/// Display the products of a category.
///
/// # Errors
///
/// Returns 404 if the category doesn't exist.
#[instrument(skip(session, state))]
pub async fn category(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<CategoryTemplate> {
    let categories = state.categories();
    let products = state.products();
    let (category, listed) = tokio::join!(categories.get(id), products.list_by_category(id));

    let category = category?.ok_or_else(|| AppError::NotFound("Category".to_owned()))?;
    let listed = or_empty(listed, "category products");

    Ok(CategoryTemplate {
        viewer: session.viewer(),
        category: CategoryCard::from(&category),
        products: listed.iter().map(ProductCard::from).collect(),
    })
}

/// Display a product with its category and related products.
///
/// # Errors
///
/// Returns 404 if the product doesn't exist.
#[instrument(skip(session, state))]
pub async fn show(
    session: CurrentSession,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ProductShowTemplate> {
    let products = state.products();
    let categories = state.categories();
    let (product, all_categories) = tokio::join!(products.get(id), categories.list());

    let product = product?.ok_or_else(|| AppError::NotFound("Product".to_owned()))?;
    let category = or_empty(all_categories, "categories")
        .iter()
        .find(|c| c.id == product.category_id)
        .map(CategoryCard::from);

    let related = or_empty(
        products.list_by_category(product.category_id).await,
        "related products",
    )
    .iter()
    .filter(|p| p.id != product.id)
    .take(RELATED_LIMIT)
    .map(ProductCard::from)
    .collect();

    Ok(ProductShowTemplate {
        viewer: session.viewer(),
        product: ProductDetailView::from(product),
        category,
        related,
    })
}
