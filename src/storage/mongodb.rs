//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides [`MongoDocumentStore`], a [`DocumentStore`] backed by a
//! `mongodb::Database`. Each console collection maps to the MongoDB
//! collection of the same name.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! wardview = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Serialization strategy
//!
//! Documents are exchanged as `serde_json` objects and converted to BSON at
//! the edge. `_id` is split off into [`RawDocument::id`]; both string and
//! ObjectId identifiers are accepted. BSON dates come back as relaxed
//! extended JSON (`{"$date": ...}`), which the normalizer understands.

use crate::core::query::{Direction, QueryDescriptor, WhereClause, WhereOp};
use crate::core::store::{DocumentStore, RawDocument, StoreError};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Database;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::ErrorKind;
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a JSON object into a BSON Document
fn json_to_document(fields: &Map<String, Value>) -> Result<Document, StoreError> {
    let bson_val = mongodb::bson::to_bson(fields)
        .map_err(|e| StoreError::Malformed(format!("Failed to convert JSON to BSON: {}", e)))?;

    match bson_val {
        Bson::Document(d) => Ok(d),
        _ => Err(StoreError::Malformed(
            "Expected BSON document, got non-object".to_string(),
        )),
    }
}

/// Render a BSON `_id` as the string identifier used by controllers
fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

/// Convert a BSON Document into a [`RawDocument`], splitting off `_id`
fn document_to_raw(mut doc: Document) -> Result<RawDocument, StoreError> {
    let id = doc
        .remove("_id")
        .map(|id| id_to_string(&id))
        .ok_or_else(|| StoreError::Malformed("document without _id".to_string()))?;

    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(fields) => Ok(RawDocument::new(id, fields)),
        _ => Err(StoreError::Malformed(format!(
            "document '{}' is not an object",
            id
        ))),
    }
}

/// Filter matching a document by identifier, whichever BSON type it was stored as
fn id_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": { "$in": [Bson::String(id.to_string()), Bson::ObjectId(oid)] } },
        Err(_) => doc! { "_id": id },
    }
}

fn value_to_bson(value: &Value) -> Result<Bson, StoreError> {
    mongodb::bson::to_bson(value)
        .map_err(|e| StoreError::Malformed(format!("Failed to convert JSON to BSON: {}", e)))
}

fn clause_to_document(clause: &WhereClause) -> Result<Document, StoreError> {
    let value = value_to_bson(&clause.value)?;
    let field = clause.field.as_str();
    let condition = match clause.op {
        WhereOp::Eq => return Ok(doc! { field: value }),
        WhereOp::Ne => doc! { "$ne": value },
        WhereOp::Lt => doc! { "$lt": value },
        WhereOp::Lte => doc! { "$lte": value },
        WhereOp::Gt => doc! { "$gt": value },
        WhereOp::Gte => doc! { "$gte": value },
        WhereOp::In => doc! { "$in": value },
    };
    Ok(doc! { field: condition })
}

/// Build the `find` filter for a descriptor
///
/// Ordering by a field leaves out documents that lack it, as hosted document
/// stores do.
fn query_filter(query: &QueryDescriptor) -> Result<Document, StoreError> {
    let mut conditions = Vec::new();
    if let Some(clause) = &query.filter {
        conditions.push(clause_to_document(clause)?);
    }
    if let Some(order) = &query.order_by {
        let field = order.field.as_str();
        conditions.push(doc! { field: { "$exists": true } });
    }

    Ok(match conditions.len() {
        0 => Document::new(),
        1 => conditions.remove(0),
        _ => doc! { "$and": conditions },
    })
}

fn query_sort(query: &QueryDescriptor) -> Option<Document> {
    query.order_by.as_ref().map(|order| {
        let direction = match order.direction {
            Direction::Asc => 1,
            Direction::Desc => -1,
        };
        let field = order.field.as_str();
        doc! { field: direction }
    })
}

fn map_driver_error(context: &str, err: mongodb::error::Error) -> StoreError {
    match *err.kind {
        ErrorKind::Authentication { .. } => {
            StoreError::PermissionDenied(format!("{}: {}", context, err))
        }
        _ => StoreError::Unavailable(format!("{}: {}", context, err)),
    }
}

// ---------------------------------------------------------------------------
// MongoDocumentStore
// ---------------------------------------------------------------------------

/// Document store backed by MongoDB.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use wardview::storage::MongoDocumentStore;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let store = Arc::new(MongoDocumentStore::new(client.database("console")));
/// let controller = ViewStateController::new(store, config.resource("dumps")?.clone());
/// ```
#[derive(Clone, Debug)]
pub struct MongoDocumentStore {
    database: Database,
}

impl MongoDocumentStore {
    /// Create a new `MongoDocumentStore` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<RawDocument>, StoreError> {
        let filter = query_filter(query)?;
        let collection = self.collection(&query.collection);
        let find = collection.find(filter);
        let find = match query_sort(query) {
            Some(sort) => find.sort(sort),
            None => find,
        };

        let cursor = find
            .await
            .map_err(|e| map_driver_error("Failed to query documents", e))?;

        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_driver_error("Failed to collect documents", e))?;

        docs.into_iter().map(document_to_raw).collect()
    }

    /// `$set` the patched fields; fails with `NotFound` when nothing matched
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let set = json_to_document(patch)?;

        let result = self
            .collection(collection)
            .update_one(id_filter(id), doc! { "$set": set })
            .await
            .map_err(|e| map_driver_error("Failed to update document", e))?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn create_document(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, StoreError> {
        let mut doc = json_to_document(fields)?;
        let id = Uuid::new_v4().simple().to_string();
        doc.insert("_id", id.clone());

        self.collection(collection)
            .insert_one(doc)
            .await
            .map_err(|e| map_driver_error("Failed to create document", e))?;

        Ok(id)
    }
}
