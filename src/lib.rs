//! # wardview
//!
//! View-state controllers for a municipal waste-management admin console.
//!
//! Every console page (dump reports, image proofs, pickup requests,
//! attendance, directory, dashboard) follows the same cycle: fetch a
//! collection from a remote document store, normalize it into
//! [`ViewRecord`](core::ViewRecord)s, derive what the page shows, and write
//! back whole fields that only appear locally once the store confirmed them.
//!
//! ## Features
//!
//! - **Fetch and normalize**: provider timestamps and geo points become plain values
//! - **Pure derivation**: filters, buckets (month buckets in calendar order),
//!   zero-guarded percentages rounded to one decimal
//! - **Confirmed writes**: no local change before the store acknowledges a write;
//!   concurrent writes settle in confirmation order
//! - **Stale loads discarded**: only the latest load can settle the page state
//! - **Status surface**: `Loading`, `Ready(records)` or `Failed(message)`,
//!   observable through a `watch` channel and an event bus
//! - **Configuration-Based**: resources described in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wardview::prelude::*;
//!
//! let store = Arc::new(InMemoryDocumentStore::new());
//! let console = Console::new(store, ConsoleConfig::default_config());
//!
//! let attendance = console.attendance()?;
//! attendance.load().await?;
//! println!("{}% present", attendance.summary().presence_rate);
//! ```

pub mod config;
pub mod console;
pub mod core;
pub mod storage;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Bucket, BucketOrder, DeriveSpec, DerivedView, Direction, DocumentStore, EventBus,
        EventEnvelope, FilterPredicate, GeoPoint, Grouping, Metric, NormalizeSpec, Patch,
        QueryDescriptor, RawDocument, StoreError, TimestampFormat, ViewEvent, ViewRecord,
        ViewState, ViewStateController, WhereOp, derive,
    };

    // === Errors ===
    pub use crate::core::{
        ConfigError, FetchError, MutationError, ValidationError, ViewError, ViewResult,
    };

    // === Config ===
    pub use crate::config::{ConsoleConfig, MapConfig, ResourceConfig, resources};

    // === Console ===
    pub use crate::console::{
        AttendancePage, Console, DashboardPage, DirectoryPage, DumpsPage, PickupsPage,
        ProofsPage, Review, StatusFilter,
    };

    // === Storage ===
    pub use crate::storage::InMemoryDocumentStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoDocumentStore;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
