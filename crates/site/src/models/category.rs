//! Product category domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use savers_core::CategoryId;

/// A product category shown on the catalog grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique display name.
    pub name: String,
    /// Public URL of the category image.
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for creating or updating a category.
///
/// Construct through [`crate::actions::categories`], which trims and checks
/// the raw form values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInput {
    pub name: String,
    pub image: String,
}
