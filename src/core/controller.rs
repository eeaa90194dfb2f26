//! The per-page view-state controller
//!
//! A [`ViewStateController`] owns the record set of one console page. It is
//! created when the page is entered and dropped when the page is left; no
//! state is shared between controllers.
//!
//! # Lifecycle
//!
//! ```text
//!            load()                 store answered + normalized
//!  Loading ───────────▶ (query) ──────────────────────────────▶ Ready
//!     ▲                    │
//!     │ load()             └── store / decode / deadline error ──▶ Failed
//!     └──────────────── from any state
//! ```
//!
//! # Writes
//!
//! [`mutate`](ViewStateController::mutate) and
//! [`create`](ViewStateController::create) validate first, then wait for the
//! store to confirm, and only then touch the local record set. Concurrent
//! writes to one record are applied in the order the store confirms them.

use crate::config::ResourceConfig;
use crate::core::derive::{DeriveSpec, DerivedView, derive};
use crate::core::error::{FetchError, MutationError, ValidationError, ViewError, ViewResult};
use crate::core::events::{EventBus, EventEnvelope, ViewEvent};
use crate::core::query::QueryDescriptor;
use crate::core::record::{Patch, ViewRecord};
use crate::core::store::DocumentStore;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;

/// What a page renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum ViewState {
    /// A load is in flight
    Loading,
    /// The current record set; may be empty
    Ready(Vec<ViewRecord>),
    /// User-facing message; no stale records are kept
    Failed(String),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ViewState::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ViewState::Failed(_))
    }

    /// Ready with zero records: render "no records", not an error
    pub fn is_empty_ready(&self) -> bool {
        matches!(self, ViewState::Ready(records) if records.is_empty())
    }

    pub fn records(&self) -> Option<&[ViewRecord]> {
        match self {
            ViewState::Ready(records) => Some(records),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ViewState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    records: Vec<ViewRecord>,
    latest_seq: u64,
}

impl Inner {
    fn snapshot(&self) -> ViewState {
        match &self.phase {
            Phase::Loading => ViewState::Loading,
            Phase::Ready => ViewState::Ready(self.records.clone()),
            Phase::Failed(message) => ViewState::Failed(message.clone()),
        }
    }
}

/// Decrements the in-flight write counter when dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fetch / derive / confirmed-write controller for one resource
pub struct ViewStateController {
    store: Arc<dyn DocumentStore>,
    resource: ResourceConfig,
    inner: RwLock<Inner>,
    seq: AtomicU64,
    in_flight: AtomicUsize,
    state_tx: watch::Sender<ViewState>,
    events: EventBus,
}

impl ViewStateController {
    /// Create a controller in the `Loading` state with its own event bus
    pub fn new(store: Arc<dyn DocumentStore>, resource: ResourceConfig) -> Self {
        Self::with_events(store, resource, EventBus::default())
    }

    /// Create a controller publishing on a shared event bus
    pub fn with_events(
        store: Arc<dyn DocumentStore>,
        resource: ResourceConfig,
        events: EventBus,
    ) -> Self {
        let (state_tx, _) = watch::channel(ViewState::Loading);
        Self {
            store,
            resource,
            inner: RwLock::new(Inner {
                phase: Phase::Loading,
                records: Vec::new(),
                latest_seq: 0,
            }),
            seq: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            state_tx,
            events,
        }
    }

    pub fn resource(&self) -> &ResourceConfig {
        &self.resource
    }

    fn collection(&self) -> &str {
        self.resource.collection()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_state(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.snapshot());
    }

    async fn within_deadline<F, T>(&self, fut: F) -> Result<T, u64>
    where
        F: Future<Output = T>,
    {
        match self.resource.timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), fut)
                .await
                .map_err(|_| ms),
            None => Ok(fut.await),
        }
    }

    // =========================================================================
    // Status surface
    // =========================================================================

    /// Current state snapshot
    pub fn state(&self) -> ViewState {
        self.read().snapshot()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state_tx.subscribe()
    }

    /// State changes as a stream, starting with the current state
    pub fn state_stream(&self) -> WatchStream<ViewState> {
        WatchStream::new(self.watch())
    }

    /// Subscribe to load and write events
    pub fn events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    /// True while a load or a write is outstanding; pages disable actions meanwhile
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0 || self.read().phase == Phase::Loading
    }

    /// Records of the `Ready` set; empty in any other state
    pub fn records(&self) -> Vec<ViewRecord> {
        let inner = self.read();
        match inner.phase {
            Phase::Ready => inner.records.clone(),
            _ => Vec::new(),
        }
    }

    pub fn find(&self, id: &str) -> Option<ViewRecord> {
        let inner = self.read();
        if inner.phase != Phase::Ready {
            return None;
        }
        inner.records.iter().find(|r| r.id == id).cloned()
    }

    /// Derive view state from the current `Ready` set
    pub fn derive(&self, spec: &DeriveSpec) -> DerivedView {
        let inner = self.read();
        match inner.phase {
            Phase::Ready => derive(&inner.records, spec),
            _ => derive(&[], spec),
        }
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Load the resource's configured query
    pub async fn load(&self) -> ViewResult<Vec<ViewRecord>> {
        let query = self.resource.query.clone();
        self.load_query(&query).await
    }

    /// Load an explicit query, replacing the record set on success
    ///
    /// Only the most recently issued load may settle the state. A load that
    /// resolves after a newer one was issued returns
    /// [`FetchError::Superseded`] and leaves the state alone.
    pub async fn load_query(&self, query: &QueryDescriptor) -> ViewResult<Vec<ViewRecord>> {
        query.validate()?;

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut inner = self.write();
            inner.latest_seq = seq;
            inner.phase = Phase::Loading;
            self.publish_state(&inner);
        }
        tracing::debug!(collection = %query.collection, seq, "loading");

        let outcome = match self.within_deadline(self.store.query(query)).await {
            Err(after_ms) => Err(FetchError::Timeout {
                collection: query.collection.clone(),
                after_ms,
            }),
            Ok(Err(err)) => Err(FetchError::from_store(&query.collection, err)),
            Ok(Ok(docs)) => self
                .resource
                .normalize
                .normalize_all(&query.collection, docs),
        };

        let mut inner = self.write();
        if inner.latest_seq != seq {
            tracing::debug!(
                collection = %query.collection,
                seq,
                latest = inner.latest_seq,
                "discarding superseded load"
            );
            return Err(FetchError::Superseded {
                collection: query.collection.clone(),
                seq,
            }
            .into());
        }

        match outcome {
            Ok(records) => {
                inner.records = records.clone();
                inner.phase = Phase::Ready;
                self.publish_state(&inner);
                drop(inner);

                tracing::info!(collection = %query.collection, count = records.len(), "loaded");
                self.events.publish(ViewEvent::Loaded {
                    collection: query.collection.clone(),
                    count: records.len(),
                });
                Ok(records)
            }
            Err(err) => {
                let message = match &err {
                    FetchError::Store { .. } | FetchError::Decode { .. } => {
                        format!("Failed to load {}.", self.resource.label)
                    }
                    other => ViewError::from(other.clone()).user_message(),
                };
                inner.records.clear();
                inner.phase = Phase::Failed(message.clone());
                self.publish_state(&inner);
                drop(inner);

                tracing::warn!(collection = %query.collection, error = %err, "load failed");
                self.events.publish(ViewEvent::LoadFailed {
                    collection: query.collection.clone(),
                    code: err.error_code().to_string(),
                    message,
                });
                Err(err.into())
            }
        }
    }

    // =========================================================================
    // Confirmed writes
    // =========================================================================

    fn ensure_ready(&self, id: Option<&str>) -> Result<(), ValidationError> {
        let inner = self.read();
        if inner.phase != Phase::Ready {
            return Err(ValidationError::NotReady {
                collection: self.collection().to_string(),
            });
        }
        if let Some(id) = id {
            if !inner.records.iter().any(|r| r.id == id) {
                return Err(ValidationError::UnknownRecord { id: id.to_string() });
            }
        }
        Ok(())
    }

    /// Write whole fields of one record, then apply them locally
    ///
    /// Nothing local changes unless the store confirms the write.
    pub async fn mutate(&self, id: &str, patch: Patch) -> ViewResult<()> {
        patch.validate(self.resource.mutable_fields.as_deref())?;
        let local = self.resource.normalize.normalize_patch(&patch)?;
        self.ensure_ready(Some(id))?;

        let collection = self.collection().to_string();
        let _in_flight = InFlight::enter(&self.in_flight);
        tracing::debug!(%collection, document_id = %id, fields = patch.len(), "writing patch");

        let wire = patch.to_map();
        match self
            .within_deadline(self.store.update_fields(&collection, id, &wire))
            .await
        {
            Err(after_ms) => {
                let err = MutationError::Timeout {
                    collection,
                    after_ms,
                };
                tracing::warn!(document_id = %id, error = %err, "write failed");
                return Err(err.into());
            }
            Ok(Err(store_err)) => {
                let err = MutationError::from_store(&collection, Some(id), store_err);
                tracing::warn!(document_id = %id, error = %err, "write failed");
                return Err(err.into());
            }
            Ok(Ok(())) => {}
        }

        self.apply_local(id, &local);
        self.events.publish(ViewEvent::Updated {
            collection,
            document_id: id.to_string(),
            patch: serde_json::Value::Object(local.to_map()),
        });
        Ok(())
    }

    /// Shallow-merge a confirmed patch into the local record
    fn apply_local(&self, id: &str, patch: &Patch) {
        let mut inner = self.write();
        match inner.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.apply_patch(patch);
                tracing::debug!(collection = %self.collection(), document_id = %id, "applied confirmed patch");
            }
            None => {
                tracing::debug!(
                    collection = %self.collection(),
                    document_id = %id,
                    "confirmed patch for a record no longer in view"
                );
            }
        }
        if inner.phase == Phase::Ready {
            self.publish_state(&inner);
        }
    }

    /// Insert a document, then append it locally
    pub async fn create(&self, fields: Patch) -> ViewResult<ViewRecord> {
        fields.validate(self.resource.mutable_fields.as_deref())?;
        let local = self.resource.normalize.normalize_patch(&fields)?;
        self.ensure_ready(None)?;

        let collection = self.collection().to_string();
        let _in_flight = InFlight::enter(&self.in_flight);

        let wire = fields.to_map();
        let id = match self
            .within_deadline(self.store.create_document(&collection, &wire))
            .await
        {
            Err(after_ms) => {
                return Err(MutationError::Timeout {
                    collection,
                    after_ms,
                }
                .into());
            }
            Ok(Err(store_err)) => {
                let err = MutationError::from_store(&collection, None, store_err);
                tracing::warn!(error = %err, "insert failed");
                return Err(err.into());
            }
            Ok(Ok(id)) => id,
        };

        let fields = local.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let record = ViewRecord::new(id.clone(), fields);
        {
            let mut inner = self.write();
            inner.records.retain(|r| r.id != id);
            inner.records.push(record.clone());
            if inner.phase == Phase::Ready {
                self.publish_state(&inner);
            }
        }
        tracing::info!(%collection, document_id = %id, "created");
        self.events.publish(ViewEvent::Created {
            collection,
            document_id: id,
        });
        Ok(record)
    }
}

impl std::fmt::Debug for ViewStateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewStateController")
            .field("resource", &self.resource.name)
            .field("collection", &self.collection())
            .field("state", &self.read().phase)
            .finish()
    }
}
