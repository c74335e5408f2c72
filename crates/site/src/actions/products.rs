//! Product actions.

use std::collections::BTreeMap;

use tracing::{info, instrument};

use savers_core::{CategoryId, ProductId};

use super::{ActionError, BatchItemResult, max_length, optional, required};
use crate::cache::{CacheKey, CacheTag, QueryCache};
use crate::db::{CatalogStore, RepositoryError};
use crate::models::{Product, ProductInput};

const MAX_NAME_LENGTH: usize = 200;

/// Unvalidated product fields, as collected from the admin form.
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub name: String,
    pub model: Option<String>,
    pub description: String,
    pub category_id: Option<CategoryId>,
    /// One feature per entry, in display order.
    pub key_features: Vec<String>,
    /// Specification rows in the order entered.
    pub specifications: Vec<(String, String)>,
    pub image: String,
    pub brochure_url: Option<String>,
}

impl ProductDraft {
    /// Trim and validate every field.
    ///
    /// Blank feature lines and specification rows are dropped. A repeated
    /// specification name keeps the last value.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when a required field is blank.
    pub fn validate(&self) -> Result<ProductInput, ActionError> {
        let name = max_length(required(&self.name, "Name")?, "Name", MAX_NAME_LENGTH)?;
        let description = required(&self.description, "Description")?;
        let category_id = self
            .category_id
            .ok_or_else(|| ActionError::Validation("Category is required".to_owned()))?;
        let image = required(&self.image, "Image")?;

        let key_features = self
            .key_features
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_owned)
            .collect();

        let mut specifications = BTreeMap::new();
        for (key, value) in &self.specifications {
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() && value.is_empty() {
                continue;
            }
            if key.is_empty() {
                return Err(ActionError::Validation(format!(
                    "Specification \"{value}\" needs a name"
                )));
            }
            specifications.insert(key.to_owned(), value.to_owned());
        }

        Ok(ProductInput {
            name,
            model: optional(self.model.as_deref()),
            description,
            category_id,
            key_features,
            specifications,
            image,
            brochure_url: optional(self.brochure_url.as_deref()),
        })
    }
}

/// Split a textarea into feature lines.
#[must_use]
pub fn parse_feature_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parse `Name: Value` lines into specification rows.
///
/// # Errors
///
/// Returns `ActionError::Validation` naming the first line without a colon.
pub fn parse_specification_lines(text: &str) -> Result<Vec<(String, String)>, ActionError> {
    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(ActionError::Validation(format!(
                "Specification line {} must look like \"Name: Value\"",
                index + 1
            )));
        };
        rows.push((key.trim().to_owned(), value.trim().to_owned()));
    }
    Ok(rows)
}

/// Render specification rows back into `Name: Value` lines.
#[must_use]
pub fn specification_lines(specs: &BTreeMap<String, String>) -> String {
    specs
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Product reads and writes.
pub struct ProductActions<'a> {
    store: &'a dyn CatalogStore,
    cache: &'a QueryCache,
}

impl<'a> ProductActions<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn CatalogStore, cache: &'a QueryCache) -> Self {
        Self { store, cache }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn list(&self) -> Result<Vec<Product>, ActionError> {
        Ok(self
            .cache
            .get_or_load(CacheKey::Products, || self.store.list_products())
            .await?)
    }

    /// Products of one category, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, ActionError> {
        Ok(self
            .cache
            .get_or_load(CacheKey::ProductsByCategory(category_id), || {
                self.store.list_products_by_category(category_id)
            })
            .await?)
    }

    /// One product by id.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, ActionError> {
        let product: Option<Box<Product>> = self
            .cache
            .get_or_load(CacheKey::Product(id), || async {
                Ok::<_, RepositoryError>(self.store.find_product(id).await?.map(Box::new))
            })
            .await?;
        Ok(product.map(|p| *p))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for invalid input or a missing
    /// category.
    #[instrument(skip(self, draft), fields(name = %draft.name.trim()))]
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, ActionError> {
        let input = self.validate(draft).await?;
        let product = self.store.insert_product(&input).await?;
        self.cache.invalidate(CacheTag::Products);
        info!(id = %product.id, "Product created");
        Ok(product)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::NotFound` if it does not exist and
    /// `ActionError::Validation` for invalid input.
    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: ProductId, draft: &ProductDraft) -> Result<Product, ActionError> {
        if self.store.find_product(id).await?.is_none() {
            return Err(not_found());
        }
        let input = self.validate(draft).await?;
        let product = self
            .store
            .update_product(id, &input)
            .await?
            .ok_or_else(not_found)?;
        self.cache.invalidate(CacheTag::Products);
        info!("Product updated");
        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::NotFound` if it does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), ActionError> {
        if self.store.find_product(id).await?.is_none() {
            return Err(not_found());
        }
        if !self.store.delete_product(id).await? {
            return Err(not_found());
        }
        self.cache.invalidate(CacheTag::Products);
        info!("Product deleted");
        Ok(())
    }

    /// Delete each id independently; one failure never stops the rest.
    pub async fn delete_many(&self, ids: &[ProductId]) -> Vec<BatchItemResult<ProductId>> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            results.push(BatchItemResult::from_result(id, self.delete(id).await));
        }
        results
    }

    async fn validate(&self, draft: &ProductDraft) -> Result<ProductInput, ActionError> {
        let input = draft.validate()?;
        if self.store.find_category(input.category_id).await?.is_none() {
            return Err(ActionError::Validation(
                "Selected category does not exist".to_owned(),
            ));
        }
        Ok(input)
    }
}

fn not_found() -> ActionError {
    ActionError::NotFound("Product not found".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actions::{CategoryActions, CategoryForm};
    use crate::db::MemoryStore;

    fn draft(category_id: Option<CategoryId>) -> ProductDraft {
        ProductDraft {
            name: " Office Safe ".to_owned(),
            model: Some("  ".to_owned()),
            description: "Compact safe".to_owned(),
            category_id,
            key_features: vec!["Fireproof".to_owned(), "   ".to_owned()],
            specifications: vec![
                ("Weight".to_owned(), "20 kg".to_owned()),
                (String::new(), String::new()),
            ],
            image: "https://cdn.test/safe.png".to_owned(),
            brochure_url: None,
        }
    }

    #[test]
    fn test_validate_normalizes_fields() {
        let input = draft(Some(CategoryId::new(1))).validate().unwrap();
        assert_eq!(input.name, "Office Safe");
        assert_eq!(input.model, None);
        assert_eq!(input.key_features, vec!["Fireproof".to_owned()]);
        assert_eq!(input.specifications.get("Weight").map(String::as_str), Some("20 kg"));
        assert_eq!(input.specifications.len(), 1);
    }

    #[test]
    fn test_validate_requires_category() {
        let err = draft(None).validate().unwrap_err();
        assert_eq!(err.user_message(), "Category is required");
    }

    #[test]
    fn test_specification_lines_round_trip() {
        let rows = parse_specification_lines("Weight: 20 kg\n\nLock: Digital: keypad\n").unwrap();
        assert_eq!(
            rows,
            vec![
                ("Weight".to_owned(), "20 kg".to_owned()),
                ("Lock".to_owned(), "Digital: keypad".to_owned()),
            ]
        );
        assert!(parse_specification_lines("no colon here").is_err());

        let map: BTreeMap<_, _> = rows.into_iter().collect();
        assert_eq!(specification_lines(&map), "Lock: Digital: keypad\nWeight: 20 kg");
    }

    #[test]
    fn test_feature_lines_skip_blanks() {
        assert_eq!(parse_feature_lines(" a \n\n b\r\n"), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_category() {
        let store = MemoryStore::new();
        let cache = QueryCache::new();
        let products = ProductActions::new(&store, &cache);

        let err = products
            .create(&draft(Some(CategoryId::new(42))))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_missing_product_reports_not_found_first() {
        let store = MemoryStore::new();
        let cache = QueryCache::new();
        let products = ProductActions::new(&store, &cache);

        let err = products
            .update(ProductId::new(7), &draft(None))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Product not found");
    }

    #[tokio::test]
    async fn test_category_listing_reflects_new_product() {
        let store = MemoryStore::new();
        let cache = QueryCache::new();
        let category = CategoryActions::new(&store, &cache)
            .create(&CategoryForm {
                name: "Safes".to_owned(),
                image: "https://cdn.test/safes.png".to_owned(),
            })
            .await
            .unwrap();
        let products = ProductActions::new(&store, &cache);

        assert!(products.list_by_category(category.id).await.unwrap().is_empty());
        products.create(&draft(Some(category.id))).await.unwrap();
        assert_eq!(products.list_by_category(category.id).await.unwrap().len(), 1);
    }
}
