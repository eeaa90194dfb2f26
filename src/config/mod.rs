//! Console configuration: which collection backs each page and how its
//! documents are normalized

use crate::core::error::ConfigError;
use crate::core::field::{GeoPoint, TimestampFormat};
use crate::core::normalize::NormalizeSpec;
use crate::core::query::{Direction, QueryDescriptor};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;

/// Resource names used by [`ConsoleConfig::default_config`]
pub mod resources {
    pub const USERS: &str = "users";
    pub const COLLECTORS: &str = "collectors";
    pub const ATTENDANCE: &str = "attendance";
    pub const DUMPS: &str = "dumps";
    pub const IMAGE_PROOFS: &str = "image_proofs";
    pub const FEEDBACK: &str = "feedback";
    pub const PICKUP_REQUESTS: &str = "pickup_requests";
    pub const WARDS: &str = "wards";
}

/// Configuration for one console resource (one page)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource name (e.g., "dumps")
    pub name: String,

    /// Plural noun used in messages (e.g., "dump reports")
    pub label: String,

    /// Query issued on every load
    pub query: QueryDescriptor,

    /// Normalization rules for fetched documents
    #[serde(default)]
    pub normalize: NormalizeSpec,

    /// Fields a patch may touch; any field is accepted when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutable_fields: Option<Vec<String>>,

    /// Deadline for store calls, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ResourceConfig {
    pub fn new(name: impl Into<String>, label: impl Into<String>, query: QueryDescriptor) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            query,
            normalize: NormalizeSpec::default(),
            mutable_fields: None,
            timeout_ms: None,
        }
    }

    pub fn normalize(mut self, normalize: NormalizeSpec) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn mutable_fields(mut self, fields: &[&str]) -> Self {
        self.mutable_fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Collection backing this resource
    pub fn collection(&self) -> &str {
        &self.query.collection
    }
}

/// Map defaults for the dump hotspot view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Center used when no report carries coordinates
    pub default_center: GeoPoint,

    /// Zoom used with the default center
    pub default_zoom: u8,

    /// Zoom used when centering on reports
    pub focused_zoom: u8,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            // geographic center of India
            default_center: GeoPoint::new(20.5937, 78.9629),
            default_zoom: 5,
            focused_zoom: 10,
        }
    }
}

fn default_unknown_label() -> String {
    crate::core::derive::UNKNOWN_LABEL.to_string()
}

/// Complete console configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// One entry per page
    pub resources: Vec<ResourceConfig>,

    #[serde(default)]
    pub map: MapConfig,

    /// Sentinel bucket label for missing grouping keys
    #[serde(default = "default_unknown_label")]
    pub unknown_label: String,
}

impl ConsoleConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a resource by name
    pub fn resource(&self, name: &str) -> Result<&ResourceConfig, ConfigError> {
        self.resources
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ConfigError::UnknownResource {
                name: name.to_string(),
            })
    }

    /// Check names are unique and every query is valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for resource in &self.resources {
            if !names.insert(resource.name.as_str()) {
                return Err(ConfigError::InvalidResource {
                    name: resource.name.clone(),
                    message: "declared twice".to_string(),
                });
            }
            resource
                .query
                .validate()
                .map_err(|e| ConfigError::InvalidResource {
                    name: resource.name.clone(),
                    message: e.to_string(),
                })?;
            if resource.timeout_ms == Some(0) {
                return Err(ConfigError::InvalidResource {
                    name: resource.name.clone(),
                    message: "timeout_ms must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Merge configurations; later resources replace earlier ones with the same name
    ///
    /// Map settings and the sentinel label come from the last configuration.
    pub fn merge(configs: Vec<ConsoleConfig>) -> Self {
        let mut merged = Self {
            resources: Vec::new(),
            map: MapConfig::default(),
            unknown_label: default_unknown_label(),
        };

        for config in configs {
            for resource in config.resources {
                match merged.resources.iter_mut().find(|r| r.name == resource.name) {
                    Some(existing) => *existing = resource,
                    None => merged.resources.push(resource),
                }
            }
            merged.map = config.map;
            merged.unknown_label = config.unknown_label;
        }

        merged
    }

    /// The eight console pages with their production collections
    pub fn default_config() -> Self {
        use resources::*;

        let dated = |collection: &str| {
            QueryDescriptor::collection(collection).order_by("date", Direction::Desc)
        };

        Self {
            resources: vec![
                ResourceConfig::new(USERS, "end users", QueryDescriptor::collection("users")),
                ResourceConfig::new(
                    COLLECTORS,
                    "collectors",
                    QueryDescriptor::collection("collectors"),
                ),
                ResourceConfig::new(ATTENDANCE, "attendance records", dated("attendance"))
                    .normalize(NormalizeSpec::new().timestamp("date", TimestampFormat::Date)),
                ResourceConfig::new(DUMPS, "dump reports", dated("alerts"))
                    .normalize(
                        NormalizeSpec::new()
                            .timestamp("date", TimestampFormat::Date)
                            .geo_point("location")
                            .default_value("status", json!("Pending")),
                    )
                    .mutable_fields(&["status"]),
                ResourceConfig::new(IMAGE_PROOFS, "image proofs", dated("image_proofs"))
                    .normalize(
                        NormalizeSpec::new()
                            .timestamp("date", TimestampFormat::Date)
                            .default_value("status", json!("Pending")),
                    )
                    .mutable_fields(&["status"]),
                ResourceConfig::new(FEEDBACK, "feedback", QueryDescriptor::collection("feedback")),
                ResourceConfig::new(
                    PICKUP_REQUESTS,
                    "garbage requests",
                    QueryDescriptor::collection("garbage_requests")
                        .order_by("pickupDate", Direction::Desc),
                )
                .normalize(NormalizeSpec::new().default_value("status", json!("Pending")))
                .mutable_fields(&[
                    "status",
                    "assignedCollectorId",
                    "assignedCollectorName",
                    "area",
                ]),
                ResourceConfig::new(WARDS, "wards", QueryDescriptor::collection("wards"))
                    .mutable_fields(&["name"]),
            ],
            map: MapConfig::default(),
            unknown_label: default_unknown_label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConsoleConfig::default_config();
        assert_eq!(config.resources.len(), 8);
        assert!(config.validate().is_ok());
        assert_eq!(config.resource(resources::DUMPS).unwrap().collection(), "alerts");
        assert_eq!(
            config.resource(resources::PICKUP_REQUESTS).unwrap().collection(),
            "garbage_requests"
        );
    }

    #[test]
    fn test_yaml_serialization() {
        let config = ConsoleConfig::default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();

        let parsed = ConsoleConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_resource() {
        let config = ConsoleConfig::default_config();
        assert_eq!(
            config.resource("invoices"),
            Err(ConfigError::UnknownResource {
                name: "invoices".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let yaml = r#"
resources:
  - name: wards
    label: wards
    query: { collection: wards }
  - name: wards
    label: wards again
    query: { collection: wards_v2 }
"#;
        assert!(ConsoleConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
resources:
  - name: attendance
    label: attendance records
    query:
      collection: attendance
      order_by: { field: date, direction: desc }
    normalize:
      timestamps: { date: date }
"#;
        let config = ConsoleConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.map, MapConfig::default());
        assert_eq!(config.unknown_label, "Unknown");
        let attendance = config.resource("attendance").unwrap();
        assert_eq!(
            attendance.normalize.timestamps.get("date"),
            Some(&TimestampFormat::Date)
        );
        assert!(attendance.mutable_fields.is_none());
    }

    #[test]
    fn test_invalid_query_rejected() {
        let yaml = r#"
resources:
  - name: attendance
    label: attendance records
    query:
      collection: attendance
      order_by: { field: time }
      where: { field: date, op: ">=", value: "2025-06-01" }
"#;
        assert!(ConsoleConfig::from_yaml_str(yaml).is_err());
    }
}
