//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use super::products::{CategoryCard, ProductCard, or_empty};
use crate::filters;
use crate::middleware::CurrentSession;
use crate::models::ViewerView;
use crate::state::AppState;

/// Number of newest products featured on the home page.
const FEATURED_PRODUCTS: usize = 6;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub viewer: Option<ViewerView>,
    pub categories: Vec<CategoryCard>,
    pub featured: Vec<ProductCard>,
}

/// Display the home page.
#[instrument(skip_all)]
pub async fn home(session: CurrentSession, State(state): State<AppState>) -> HomeTemplate {
    let categories = state.categories();
    let products = state.products();
    let (categories, products) = tokio::join!(categories.list(), products.list());

    HomeTemplate {
        viewer: session.viewer(),
        categories: or_empty(categories, "categories")
            .iter()
            .map(CategoryCard::from)
            .collect(),
        featured: or_empty(products, "products")
            .iter()
            .take(FEATURED_PRODUCTS)
            .map(ProductCard::from)
            .collect(),
    }
}
