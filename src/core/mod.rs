//! Core types: records, queries, the store contract and the view-state controller

pub mod controller;
pub mod derive;
pub mod error;
pub mod events;
pub mod field;
pub mod normalize;
pub mod query;
pub mod record;
pub mod store;

pub use controller::{ViewState, ViewStateController};
pub use derive::{
    Bucket, BucketOrder, DeriveSpec, DerivedView, FilterPredicate, Grouping, Metric, derive,
};
pub use error::{
    ConfigError, ErrorReport, FetchError, MutationError, ValidationError, ViewError, ViewResult,
};
pub use events::{EventBus, EventEnvelope, ViewEvent};
pub use field::{GeoPoint, TimestampFormat};
pub use normalize::NormalizeSpec;
pub use query::{Direction, OrderBy, QueryDescriptor, WhereClause, WhereOp};
pub use record::{Patch, ViewRecord};
pub use store::{DocumentStore, RawDocument, StoreError};
