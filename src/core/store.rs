//! Remote document store contract
//!
//! Controllers only ever talk to the store through [`DocumentStore`], so a
//! rendering layer never touches a store client directly and tests can swap
//! in [`InMemoryDocumentStore`](crate::storage::InMemoryDocumentStore) or a
//! scripted double.

use crate::core::query::QueryDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One document as returned by the store, before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Store-assigned identifier
    pub id: String,

    /// Raw fields, possibly containing provider-specific shapes (timestamps, geo points)
    pub fields: Map<String, Value>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build from a JSON object, ignoring non-object values
    pub fn from_json(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, fields)
    }
}

/// Failures reported by store adapters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("document '{id}' not found in '{collection}'")]
    NotFound { collection: String, id: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

/// Store trait implemented by every backend
///
/// Implementations are trusted to resolve or reject; the controller adds a
/// deadline only when one is configured.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a collection, honoring the descriptor's ordering and filter
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<RawDocument>, StoreError>;

    /// Overwrite the named top-level fields of one document
    ///
    /// Must fail with [`StoreError::NotFound`] when the document does not exist.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), StoreError>;

    /// Insert a document and return its new identifier
    async fn create_document(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_document_from_json() {
        let doc = RawDocument::from_json("w1", json!({"name": "Ward 1"}));
        assert_eq!(doc.id, "w1");
        assert_eq!(doc.fields.get("name"), Some(&json!("Ward 1")));

        let doc = RawDocument::from_json("w2", json!("not an object"));
        assert!(doc.fields.is_empty());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            collection: "alerts".to_string(),
            id: "d9".to_string(),
        };
        assert_eq!(err.to_string(), "document 'd9' not found in 'alerts'");
    }
}
