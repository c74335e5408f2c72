//! Product domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use savers_core::{CategoryId, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Manufacturer model number, if any.
    pub model: Option<String>,
    pub description: String,
    /// Owning category. Deleting the category deletes the product.
    pub category_id: CategoryId,
    /// Ordered bullet points shown on the detail page.
    pub key_features: Vec<String>,
    /// Specification name to value, rendered as a table.
    pub specifications: BTreeMap<String, String>,
    /// Public URL of the product image.
    pub image: String,
    /// Public URL of a PDF brochure.
    pub brochure_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The first few key features, for cards on listing pages.
    #[must_use]
    pub fn highlights(&self, count: usize) -> &[String] {
        self.key_features
            .get(..count.min(self.key_features.len()))
            .unwrap_or_default()
    }
}

/// Validated fields for creating or updating a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub model: Option<String>,
    pub description: String,
    pub category_id: CategoryId,
    pub key_features: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub image: String,
    pub brochure_url: Option<String>,
}
