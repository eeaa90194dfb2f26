//! In-memory implementation of DocumentStore for testing and development

use crate::core::field::parse_timestamp;
use crate::core::query::{Direction, QueryDescriptor, WhereClause, WhereOp};
use crate::core::store::{DocumentStore, RawDocument, StoreError};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

type Collection = IndexMap<String, Map<String, Value>>;

/// In-memory document store
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// clones share the same documents. Documents keep insertion order, which is
/// also the result order of queries without `order_by`.
///
/// Like a hosted document store, ordering by a field leaves out documents
/// that lack that field.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with one collection
    pub fn with_documents<I, S>(collection: &str, documents: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let store = Self::new();
        for (id, fields) in documents {
            store.insert(collection, id, fields);
        }
        store
    }

    /// Insert or replace a document; non-object values are stored as empty documents
    pub fn insert(&self, collection: &str, id: impl Into<String>, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.into(), fields);
    }

    /// Stored fields of a document
    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Value::Object(fields.clone()))
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections.get(collection).map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

/// Rank of a value's type when values of different types are compared
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::Object(_) if matches!(parse_timestamp(value), Ok(Some(_))) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Total order over field values used for sorting and range filters
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Object(_), Value::Object(_)) => match (parse_timestamp(a), parse_timestamp(b)) {
            (Ok(Some(x)), Ok(Some(y))) => x.cmp(&y),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

fn matches_clause(fields: &Map<String, Value>, clause: &WhereClause) -> bool {
    let Some(value) = fields.get(&clause.field) else {
        return clause.op == WhereOp::Ne;
    };
    let same_type = type_rank(value) == type_rank(&clause.value);
    let ord = compare_values(value, &clause.value);
    match clause.op {
        WhereOp::Eq => same_type && ord == Ordering::Equal,
        WhereOp::Ne => !(same_type && ord == Ordering::Equal),
        WhereOp::Lt => same_type && ord == Ordering::Less,
        WhereOp::Lte => same_type && ord != Ordering::Greater,
        WhereOp::Gt => same_type && ord == Ordering::Greater,
        WhereOp::Gte => same_type && ord != Ordering::Less,
        WhereOp::In => clause.value.as_array().is_some_and(|candidates| {
            candidates.iter().any(|c| {
                type_rank(c) == type_rank(value) && compare_values(value, c) == Ordering::Equal
            })
        }),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<RawDocument>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire read lock: {}", e)))?;

        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<RawDocument> = docs
            .iter()
            .filter(|(_, fields)| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|clause| matches_clause(fields, clause))
            })
            .filter(|(_, fields)| {
                query
                    .order_by
                    .as_ref()
                    .is_none_or(|order| fields.contains_key(&order.field))
            })
            .map(|(id, fields)| RawDocument::new(id.clone(), fields.clone()))
            .collect();

        if let Some(order) = &query.order_by {
            results.sort_by(|a, b| {
                let ord = match (a.fields.get(&order.field), b.fields.get(&order.field)) {
                    (Some(x), Some(y)) => compare_values(x, y),
                    _ => Ordering::Equal,
                };
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        Ok(results)
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire write lock: {}", e)))?;

        let fields = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (field, value) in patch {
            fields.insert(field.clone(), value.clone());
        }

        Ok(())
    }

    async fn create_document(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Failed to acquire write lock: {}", e)))?;

        let id = Uuid::new_v4().simple().to_string();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields.clone());

        Ok(id)
    }
}
