//! Shared test harness for controller and console tests
//!
//! Provides [`ScriptedStore`], a [`DocumentStore`] wrapping an
//! [`InMemoryDocumentStore`] whose calls can be delayed, failed or answered
//! with a fixed result set, plus fixtures for the console collections.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod store_harness;
//! use store_harness::*;
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use wardview::core::{DocumentStore, QueryDescriptor, RawDocument, StoreError};
use wardview::storage::InMemoryDocumentStore;

// ---------------------------------------------------------------------------
// Scripted store
// ---------------------------------------------------------------------------

/// How the next call behaves
#[derive(Debug, Clone, Default)]
pub struct Step {
    pub delay: Duration,
    pub fail: Option<StoreError>,
    /// Result set returned instead of the stored documents (queries only)
    pub documents: Option<Vec<RawDocument>>,
}

impl Step {
    pub fn delay_ms(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            ..Self::default()
        }
    }

    pub fn fail(err: StoreError) -> Self {
        Self {
            fail: Some(err),
            ..Self::default()
        }
    }

    pub fn returning(documents: Vec<RawDocument>) -> Self {
        Self {
            documents: Some(documents),
            ..Self::default()
        }
    }

    pub fn after_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// In-memory store with scripted per-call behaviour
///
/// Calls without a scripted step behave like the wrapped store. Delays are
/// awaited before the wrapped store is touched, so a delayed write lands
/// after an undelayed one.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: InMemoryDocumentStore,
    queries: Mutex<VecDeque<Step>>,
    writes: Mutex<VecDeque<Step>>,
    pub query_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
}

impl ScriptedStore {
    pub fn new(inner: InMemoryDocumentStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn script_query(&self, step: Step) {
        self.queries.lock().unwrap().push_back(step);
    }

    pub fn script_write(&self, step: Step) {
        self.writes.lock().unwrap().push_back(step);
    }

    pub fn query_count(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    async fn play(script: &Mutex<VecDeque<Step>>) -> Result<Option<Vec<RawDocument>>, StoreError> {
        let step = script.lock().unwrap().pop_front().unwrap_or_default();
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.fail {
            Some(err) => Err(err),
            None => Ok(step.documents),
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<RawDocument>, StoreError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        match Self::play(&self.queries).await? {
            Some(documents) => Ok(documents),
            None => self.inner.query(query).await,
        }
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        patch: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        Self::play(&self.writes).await?;
        self.inner.update_fields(collection, id, patch).await
    }

    async fn create_document(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        Self::play(&self.writes).await?;
        self.inner.create_document(collection, fields).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Firestore-style timestamp object
pub fn firestore_ts(seconds: i64) -> Value {
    json!({"seconds": seconds, "nanoseconds": 0})
}

/// 2025-06-03 and 2025-06-10 present, 2025-07-01 absent: 66.7% attendance
pub fn attendance_store() -> InMemoryDocumentStore {
    InMemoryDocumentStore::with_documents(
        "attendance",
        [
            ("a1", json!({"date": firestore_ts(1748962200), "status": "Present", "userId": "c1"})),
            ("a2", json!({"date": firestore_ts(1749544200), "status": "Present", "userId": "c2"})),
            ("a3", json!({"date": firestore_ts(1751356800), "status": "Absent", "userId": "c1"})),
        ],
    )
}

/// Dump reports, one pending with coordinates and one resolved without
pub fn dumps_store() -> InMemoryDocumentStore {
    InMemoryDocumentStore::with_documents(
        "alerts",
        [
            (
                "d1",
                json!({
                    "date": firestore_ts(1751356800),
                    "area": "Market",
                    "location": {"latitude": 19.07, "longitude": 72.87},
                    "locationDescription": "Behind the stalls",
                }),
            ),
            (
                "d2",
                json!({"date": firestore_ts(1748962200), "area": "Riverside", "status": "Resolved"}),
            ),
        ],
    )
}

pub fn raw(id: &str, fields: Value) -> RawDocument {
    RawDocument::from_json(id, fields)
}
