//! Controller event bus
//!
//! Every controller publishes what it did (loads, confirmed writes) on an
//! [`EventBus`] backed by `tokio::sync::broadcast`. Render layers subscribe
//! to re-render; a dashboard can subscribe to several controllers at once by
//! sharing one bus between them.
//!
//! ```text
//! ViewStateController::load()   ──┐
//! ViewStateController::mutate() ──┼──▶ EventBus::publish() ──▶ page renderers
//! ViewStateController::create() ──┘                        ──▶ dashboard widgets
//! ```
//!
//! Only confirmed outcomes are published: a write event is sent after the
//! store acknowledged it and the local record set was patched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Something a controller did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ViewEvent {
    /// A load finished and replaced the record set
    Loaded { collection: String, count: usize },

    /// A load failed; the record set was discarded
    LoadFailed {
        collection: String,
        code: String,
        message: String,
    },

    /// A patch was confirmed by the store and applied locally
    Updated {
        collection: String,
        document_id: String,
        patch: serde_json::Value,
    },

    /// A document was created and appended locally
    Created {
        collection: String,
        document_id: String,
    },
}

impl ViewEvent {
    /// Collection the event relates to
    pub fn collection(&self) -> &str {
        match self {
            ViewEvent::Loaded { collection, .. }
            | ViewEvent::LoadFailed { collection, .. }
            | ViewEvent::Updated { collection, .. }
            | ViewEvent::Created { collection, .. } => collection,
        }
    }

    /// Document the event relates to, if any
    pub fn document_id(&self) -> Option<&str> {
        match self {
            ViewEvent::Updated { document_id, .. } | ViewEvent::Created { document_id, .. } => {
                Some(document_id)
            }
            _ => None,
        }
    }

    pub fn action(&self) -> &str {
        match self {
            ViewEvent::Loaded { .. } => "loaded",
            ViewEvent::LoadFailed { .. } => "load_failed",
            ViewEvent::Updated { .. } => "updated",
            ViewEvent::Created { .. } => "created",
        }
    }
}

/// Envelope wrapping an event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: ViewEvent,
}

impl EventEnvelope {
    pub fn new(event: ViewEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone; clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events for slow receivers
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of receivers; publishing with no subscriber is not an error.
    pub fn publish(&self, event: ViewEvent) -> usize {
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
