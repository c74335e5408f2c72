//! Category actions.

use serde::Deserialize;
use tracing::{info, instrument};

use savers_core::CategoryId;

use super::{ActionError, BatchItemResult, max_length, required};
use crate::cache::{CacheKey, CacheTag, QueryCache};
use crate::db::CatalogStore;
use crate::models::{Category, CategoryInput};

const MAX_NAME_LENGTH: usize = 100;

/// Raw category form fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

impl CategoryForm {
    /// Trim and validate the form.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when a required field is blank or
    /// the name is too long.
    pub fn validate(&self) -> Result<CategoryInput, ActionError> {
        Ok(CategoryInput {
            name: max_length(required(&self.name, "Name")?, "Name", MAX_NAME_LENGTH)?,
            image: required(&self.image, "Image")?,
        })
    }
}

/// Category reads and writes.
pub struct CategoryActions<'a> {
    store: &'a dyn CatalogStore,
    cache: &'a QueryCache,
}

impl<'a> CategoryActions<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn CatalogStore, cache: &'a QueryCache) -> Self {
        Self { store, cache }
    }

    /// All categories, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn list(&self) -> Result<Vec<Category>, ActionError> {
        Ok(self
            .cache
            .get_or_load(CacheKey::Categories, || self.store.list_categories())
            .await?)
    }

    /// One category by id.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Storage` if the store fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, ActionError> {
        Ok(self
            .cache
            .get_or_load(CacheKey::Category(id), || self.store.find_category(id))
            .await?)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for invalid input and
    /// `ActionError::Conflict` if the name is taken.
    #[instrument(skip(self, form), fields(name = %form.name.trim()))]
    pub async fn create(&self, form: &CategoryForm) -> Result<Category, ActionError> {
        let input = form.validate()?;
        let category = self.store.insert_category(&input).await?;
        self.invalidate();
        info!(id = %category.id, "Category created");
        Ok(category)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::NotFound` if it does not exist,
    /// `ActionError::Validation` for invalid input and
    /// `ActionError::Conflict` if the name is taken.
    #[instrument(skip(self, form))]
    pub async fn update(&self, id: CategoryId, form: &CategoryForm) -> Result<Category, ActionError> {
        let input = form.validate()?;
        let category = self
            .store
            .update_category(id, &input)
            .await?
            .ok_or_else(not_found)?;
        self.invalidate();
        info!("Category updated");
        Ok(category)
    }

    /// Delete a category and, by cascade, its products.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::NotFound` if it does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CategoryId) -> Result<(), ActionError> {
        if self.store.find_category(id).await?.is_none() {
            return Err(not_found());
        }
        if !self.store.delete_category(id).await? {
            return Err(not_found());
        }
        self.invalidate();
        info!("Category deleted");
        Ok(())
    }

    /// Delete each id independently; one failure never stops the rest.
    pub async fn delete_many(&self, ids: &[CategoryId]) -> Vec<BatchItemResult<CategoryId>> {
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            results.push(BatchItemResult::from_result(id, self.delete(id).await));
        }
        results
    }

    // Products embed category data and are cascade-deleted with it
    fn invalidate(&self) {
        self.cache.invalidate(CacheTag::Categories);
        self.cache.invalidate(CacheTag::Products);
    }
}

fn not_found() -> ActionError {
    ActionError::NotFound("Category not found".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn form(name: &str) -> CategoryForm {
        CategoryForm {
            name: name.to_owned(),
            image: "https://cdn.test/c.png".to_owned(),
        }
    }

    #[test]
    fn test_validate_trims_fields() {
        let input = form("  Safes  ").validate().unwrap();
        assert_eq!(input.name, "Safes");
    }

    #[test]
    fn test_validate_requires_image() {
        let err = CategoryForm {
            name: "Safes".to_owned(),
            image: "  ".to_owned(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.user_message(), "Image is required");
    }

    #[tokio::test]
    async fn test_update_missing_category_is_not_found() {
        let store = MemoryStore::new();
        let cache = QueryCache::new();
        let actions = CategoryActions::new(&store, &cache);

        let err = actions
            .update(CategoryId::new(5), &form("Safes"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_category_message() {
        let store = MemoryStore::new();
        let cache = QueryCache::new();
        let actions = CategoryActions::new(&store, &cache);

        let err = actions.delete(CategoryId::new(1)).await.unwrap_err();
        assert_eq!(err.user_message(), "Category not found");
    }

    #[tokio::test]
    async fn test_rename_is_visible_to_cached_readers() {
        let store = MemoryStore::new();
        let cache = QueryCache::new();
        let actions = CategoryActions::new(&store, &cache);

        let created = actions.create(&form("Safes")).await.unwrap();
        assert_eq!(actions.get(created.id).await.unwrap().unwrap().name, "Safes");

        actions.update(created.id, &form("Vaults")).await.unwrap();
        assert_eq!(actions.get(created.id).await.unwrap().unwrap().name, "Vaults");
    }
}
