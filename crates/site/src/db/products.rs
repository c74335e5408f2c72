//! Product repository for database operations.
//!
//! Key features and specifications live in JSONB columns and are decoded
//! through `sqlx::types::Json`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use savers_core::{CategoryId, ProductId};

use super::RepositoryError;
use crate::models::{Product, ProductInput};

const CATEGORY_MISSING: &str = "Category does not exist";

const PRODUCT_COLUMNS: &str = "id, name, model, description, category_id, key_features, \
     specifications, image, brochure_url, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    model: Option<String>,
    description: String,
    category_id: i32,
    key_features: Json<Vec<String>>,
    specifications: Json<BTreeMap<String, String>>,
    image: String,
    brochure_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            model: row.model,
            description: row.description,
            category_id: CategoryId::new(row.category_id),
            key_features: row.key_features.0,
            specifications: row.specifications.0,
            image: row.image,
            brochure_url: row.brochure_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// List the products of one category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE category_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(category_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Product::from))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ForeignKey` if the category does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let sql = format!(
            "INSERT INTO product \
             (name, model, description, category_id, key_features, specifications, image, brochure_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&input.name)
            .bind(input.model.as_deref())
            .bind(&input.description)
            .bind(input.category_id)
            .bind(Json(&input.key_features))
            .bind(Json(&input.specifications))
            .bind(&input.image)
            .bind(input.brochure_url.as_deref())
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "product already exists", CATEGORY_MISSING))?;

        Ok(row.into())
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ForeignKey` if the category does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            "UPDATE product SET \
             name = $2, model = $3, description = $4, category_id = $5, key_features = $6, \
             specifications = $7, image = $8, brochure_url = $9, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(&input.name)
            .bind(input.model.as_deref())
            .bind(&input.description)
            .bind(input.category_id)
            .bind(Json(&input.key_features))
            .bind(Json(&input.specifications))
            .bind(&input.image)
            .bind(input.brochure_url.as_deref())
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_write(e, "product already exists", CATEGORY_MISSING))?;

        Ok(row.map(Product::from))
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
