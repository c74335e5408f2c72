//! Data-access actions used by the route handlers.
//!
//! Every action validates its input, reads through the [`QueryCache`] or
//! writes through a store seam, and returns `Result<T, ActionError>`.
//! Successful writes invalidate the cache tags they affect.
//!
//! [`QueryCache`]: crate::cache::QueryCache

pub mod categories;
pub mod products;
pub mod users;

use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;

pub use categories::{CategoryActions, CategoryForm};
pub use products::{ProductActions, ProductDraft};
pub use users::{UserActions, UserForm};

/// Errors returned by actions.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Input failed validation; the message is shown to the operator.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness rule was violated.
    #[error("{0}")]
    Conflict(String),

    /// The target entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The store or another backend failed. The detail is logged, never shown.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ActionError {
    /// Message safe to show in a form or JSON response.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Conflict(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Storage(_) => "Something went wrong. Please try again.".to_owned(),
        }
    }
}

impl From<RepositoryError> for ActionError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::ForeignKey(msg) => Self::Validation(msg),
            RepositoryError::NotFound => Self::NotFound("Not found".to_owned()),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Outcome of one id in a batch delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemResult<Id> {
    pub id: Id,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<Id> BatchItemResult<Id> {
    fn from_result(id: Id, result: Result<(), ActionError>) -> Self {
        match result {
            Ok(()) => Self {
                id,
                success: true,
                error: None,
            },
            Err(e) => Self {
                id,
                success: false,
                error: Some(e.user_message()),
            },
        }
    }
}

/// Trim a required field, failing with `"{label} is required"` when blank.
pub(crate) fn required(value: &str, label: &str) -> Result<String, ActionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ActionError::Validation(format!("{label} is required")));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional field, mapping blank to `None`.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Reject values longer than `max` characters.
pub(crate) fn max_length(value: String, label: &str, max: usize) -> Result<String, ActionError> {
    if value.chars().count() > max {
        return Err(ActionError::Validation(format!(
            "{label} must be at most {max} characters"
        )));
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("  Safes ", "Name").ok().as_deref(), Some("Safes"));
        let err = required(" \t", "Name").unwrap_err();
        assert_eq!(err.user_message(), "Name is required");
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional(Some("   ")), None);
        assert_eq!(optional(None), None);
        assert_eq!(optional(Some(" X-1 ")).as_deref(), Some("X-1"));
    }

    #[test]
    fn test_storage_errors_are_hidden() {
        let err = ActionError::from(RepositoryError::DataCorruption("bad row".to_owned()));
        assert!(matches!(err, ActionError::Storage(_)));
        assert!(!err.user_message().contains("bad row"));
    }

    #[test]
    fn test_batch_item_serializes_without_empty_error() {
        let ok = BatchItemResult::from_result(3, Ok(()));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"id": 3, "success": true})
        );
    }
}
