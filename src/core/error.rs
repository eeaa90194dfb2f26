//! Typed error handling for view-state controllers
//!
//! Every failure a controller can hit falls in one of three categories, which
//! lets a rendering layer decide what to show without string matching:
//!
//! - [`FetchError`]: the remote read failed (network, permission, decode, deadline)
//! - [`MutationError`]: the remote write failed, including writes to documents
//!   that no longer exist
//! - [`ValidationError`]: the caller asked for something the controller refuses
//!   before contacting the store (empty patch, bad filter combination, ...)
//!
//! [`ConfigError`] covers resource lookups against a [`ConsoleConfig`](crate::config::ConsoleConfig).
//!
//! # Example
//!
//! ```rust,ignore
//! match controller.mutate("dump-1", patch).await {
//!     Ok(()) => {}
//!     Err(ViewError::Validation(e)) => eprintln!("refused: {}", e),
//!     Err(e) => eprintln!("{} ({})", e.user_message(), e.error_code()),
//! }
//! ```

use crate::core::store::StoreError;
use serde::Serialize;
use std::fmt;

/// The main error type returned by controllers
#[derive(Debug, Clone, PartialEq)]
pub enum ViewError {
    /// Remote read failures
    Fetch(FetchError),

    /// Remote write failures
    Mutation(MutationError),

    /// Requests rejected before any remote call
    Validation(ValidationError),

    /// Configuration lookups
    Config(ConfigError),
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::Fetch(e) => write!(f, "{}", e),
            ViewError::Mutation(e) => write!(f, "{}", e),
            ViewError::Validation(e) => write!(f, "{}", e),
            ViewError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ViewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewError::Fetch(e) => Some(e),
            ViewError::Mutation(e) => Some(e),
            ViewError::Validation(e) => Some(e),
            ViewError::Config(e) => Some(e),
        }
    }
}

/// Serializable error payload for rendering layers
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    /// Error code for programmatic handling
    pub code: String,
    /// Message suitable for display to console staff
    pub message: String,
    /// Technical detail, kept out of the user-facing message
    pub detail: String,
}

impl ViewError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ViewError::Fetch(e) => e.error_code(),
            ViewError::Mutation(e) => e.error_code(),
            ViewError::Validation(_) => "VALIDATION_ERROR",
            ViewError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Message a console page can show as-is
    pub fn user_message(&self) -> String {
        match self {
            ViewError::Fetch(e) => e.user_message(),
            ViewError::Mutation(e) => e.user_message(),
            ViewError::Validation(e) => e.to_string(),
            ViewError::Config(e) => e.to_string(),
        }
    }

    /// Whether the error was raised before any remote call
    pub fn is_validation(&self) -> bool {
        matches!(self, ViewError::Validation(_))
    }

    /// Convert to a serializable report
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.error_code().to_string(),
            message: self.user_message(),
            detail: self.to_string(),
        }
    }
}

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors raised while reading a collection
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The store could not be reached or answered with a failure
    Store { collection: String, message: String },

    /// The store refused the read
    PermissionDenied { collection: String, message: String },

    /// A document could not be normalized; the whole load is aborted
    Decode {
        collection: String,
        document_id: Option<String>,
        message: String,
    },

    /// The configured deadline expired before the store answered
    Timeout { collection: String, after_ms: u64 },

    /// A newer load was issued while this one was in flight; its result was dropped
    Superseded { collection: String, seq: u64 },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Store {
                collection,
                message,
            } => write!(f, "Failed to query '{}': {}", collection, message),
            FetchError::PermissionDenied {
                collection,
                message,
            } => write!(f, "Permission denied reading '{}': {}", collection, message),
            FetchError::Decode {
                collection,
                document_id: Some(id),
                message,
            } => write!(
                f,
                "Failed to decode document '{}' in '{}': {}",
                id, collection, message
            ),
            FetchError::Decode {
                collection,
                document_id: None,
                message,
            } => write!(f, "Failed to decode '{}': {}", collection, message),
            FetchError::Timeout {
                collection,
                after_ms,
            } => write!(f, "Query on '{}' timed out after {}ms", collection, after_ms),
            FetchError::Superseded { collection, seq } => write!(
                f,
                "Load #{} of '{}' was superseded by a newer load",
                seq, collection
            ),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            FetchError::Store { .. } => "FETCH_FAILED",
            FetchError::PermissionDenied { .. } => "FETCH_FORBIDDEN",
            FetchError::Decode { .. } => "FETCH_DECODE_FAILED",
            FetchError::Timeout { .. } => "FETCH_TIMEOUT",
            FetchError::Superseded { .. } => "FETCH_SUPERSEDED",
        }
    }

    /// Collection the failed read targeted
    pub fn collection(&self) -> &str {
        match self {
            FetchError::Store { collection, .. }
            | FetchError::PermissionDenied { collection, .. }
            | FetchError::Decode { collection, .. }
            | FetchError::Timeout { collection, .. }
            | FetchError::Superseded { collection, .. } => collection,
        }
    }

    fn user_message(&self) -> String {
        match self {
            FetchError::PermissionDenied { collection, .. } => format!(
                "You do not have permission to view '{}'. Please check the access rules.",
                collection
            ),
            FetchError::Timeout { .. } => {
                "The server took too long to respond. Please try again.".to_string()
            }
            _ => format!("Failed to load records from '{}'.", self.collection()),
        }
    }

    /// Translate a store failure observed during a read
    pub fn from_store(collection: &str, err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(message) => FetchError::PermissionDenied {
                collection: collection.to_string(),
                message,
            },
            StoreError::Malformed(message) => FetchError::Decode {
                collection: collection.to_string(),
                document_id: None,
                message,
            },
            other => FetchError::Store {
                collection: collection.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<FetchError> for ViewError {
    fn from(err: FetchError) -> Self {
        ViewError::Fetch(err)
    }
}

// =============================================================================
// Mutation Errors
// =============================================================================

/// Errors raised while writing a document
#[derive(Debug, Clone, PartialEq)]
pub enum MutationError {
    /// The store could not be reached or answered with a failure
    Store {
        collection: String,
        document_id: Option<String>,
        message: String,
    },

    /// The store refused the write
    PermissionDenied {
        collection: String,
        message: String,
    },

    /// The write was accepted by the transport but the document no longer exists
    NotFound {
        collection: String,
        document_id: String,
    },

    /// The configured deadline expired before the store confirmed the write
    Timeout {
        collection: String,
        after_ms: u64,
    },
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationError::Store {
                collection,
                document_id: Some(id),
                message,
            } => write!(f, "Failed to update '{}/{}': {}", collection, id, message),
            MutationError::Store {
                collection,
                document_id: None,
                message,
            } => write!(f, "Failed to insert into '{}': {}", collection, message),
            MutationError::PermissionDenied {
                collection,
                message,
            } => write!(f, "Permission denied writing '{}': {}", collection, message),
            MutationError::NotFound {
                collection,
                document_id,
            } => write!(
                f,
                "Document '{}' no longer exists in '{}'",
                document_id, collection
            ),
            MutationError::Timeout {
                collection,
                after_ms,
            } => write!(f, "Write to '{}' timed out after {}ms", collection, after_ms),
        }
    }
}

impl std::error::Error for MutationError {}

impl MutationError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            MutationError::Store { .. } => "MUTATION_FAILED",
            MutationError::PermissionDenied { .. } => "MUTATION_FORBIDDEN",
            MutationError::NotFound { .. } => "MUTATION_TARGET_MISSING",
            MutationError::Timeout { .. } => "MUTATION_TIMEOUT",
        }
    }

    fn user_message(&self) -> String {
        match self {
            MutationError::NotFound { .. } => {
                "This record was removed by someone else. Reload the page.".to_string()
            }
            MutationError::PermissionDenied { .. } => {
                "You do not have permission to change this record.".to_string()
            }
            _ => "Failed to save the change. Please try again.".to_string(),
        }
    }

    /// Translate a store failure observed during a write
    pub fn from_store(collection: &str, document_id: Option<&str>, err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(message) => MutationError::PermissionDenied {
                collection: collection.to_string(),
                message,
            },
            StoreError::NotFound { id, .. } => MutationError::NotFound {
                collection: collection.to_string(),
                document_id: id,
            },
            other => MutationError::Store {
                collection: collection.to_string(),
                document_id: document_id.map(str::to_string),
                message: other.to_string(),
            },
        }
    }
}

impl From<MutationError> for ViewError {
    fn from(err: MutationError) -> Self {
        ViewError::Mutation(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Requests refused before contacting the store
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A patch or new document without any field
    EmptyPatch,

    /// A patch tried to write the document identifier
    ImmutableField { field: String },

    /// A patch field names a sub-path or an operator instead of a whole field
    NestedField { field: String },

    /// A patch named fields the resource does not allow to change
    UnknownFields { fields: Vec<String> },

    /// A query with an invalid filter/ordering combination
    InvalidQuery { reason: String },

    /// The controller is loading or failed; actions are disabled
    NotReady { collection: String },

    /// The record is not part of the current result set
    UnknownRecord { id: String },

    /// The record is not in a state that allows this action
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// A required input was empty
    EmptyValue { field: String },

    /// A field value has the wrong shape
    InvalidValue { field: String, message: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyPatch => write!(f, "Nothing to save: no fields were given"),
            ValidationError::ImmutableField { field } => {
                write!(f, "Field '{}' cannot be changed", field)
            }
            ValidationError::NestedField { field } => write!(
                f,
                "Field '{}' is not a top-level field name",
                field
            ),
            ValidationError::UnknownFields { fields } => {
                write!(f, "Unrecognized fields: {}", fields.join(", "))
            }
            ValidationError::InvalidQuery { reason } => write!(f, "Invalid query: {}", reason),
            ValidationError::NotReady { collection } => write!(
                f,
                "'{}' is not ready yet; wait for loading to finish",
                collection
            ),
            ValidationError::UnknownRecord { id } => {
                write!(f, "Record '{}' is not in the current view", id)
            }
            ValidationError::InvalidTransition { id, from, to } => write!(
                f,
                "Record '{}' cannot move from '{}' to '{}'",
                id, from, to
            ),
            ValidationError::EmptyValue { field } => write!(f, "'{}' cannot be empty", field),
            ValidationError::InvalidValue { field, message } => {
                write!(f, "Invalid value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ViewError {
    fn from(err: ValidationError) -> Self {
        ViewError::Validation(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to console configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No resource with that name is configured
    UnknownResource { name: String },

    /// A resource entry is inconsistent
    InvalidResource { name: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownResource { name } => write!(f, "Unknown resource: {}", name),
            ConfigError::InvalidResource { name, message } => {
                write!(f, "Invalid resource '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ViewError {
    fn from(err: ConfigError) -> Self {
        ViewError::Config(err)
    }
}

/// Result alias used throughout the crate
pub type ViewResult<T> = Result<T, ViewError>;
