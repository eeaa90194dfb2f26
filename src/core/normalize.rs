//! Raw document → [`ViewRecord`] normalization

use crate::core::error::{FetchError, ValidationError};
use crate::core::field::{GeoPoint, TimestampFormat, normalize_timestamp};
use crate::core::record::{ID_FIELD, Patch, ViewRecord};
use crate::core::store::RawDocument;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;

/// Per-resource normalization rules
///
/// Applied in order: timestamp fields, geo points, then defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeSpec {
    /// Timestamp fields and the representation they are normalized to
    #[serde(default)]
    pub timestamps: IndexMap<String, TimestampFormat>,

    /// Geo-point fields flattened into `latitude` / `longitude`
    #[serde(default)]
    pub geo_points: Vec<String>,

    /// Values used when a field is absent, null or an empty string
    #[serde(default)]
    pub defaults: IndexMap<String, Value>,
}

impl NormalizeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timestamp(mut self, field: impl Into<String>, format: TimestampFormat) -> Self {
        self.timestamps.insert(field.into(), format);
        self
    }

    pub fn geo_point(mut self, field: impl Into<String>) -> Self {
        self.geo_points.push(field.into());
        self
    }

    pub fn default_value(mut self, field: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    /// Normalize one document; the error is a human-readable reason
    pub fn normalize(&self, doc: RawDocument) -> Result<ViewRecord, String> {
        let RawDocument { id, fields: raw } = doc;
        let mut fields: IndexMap<String, Value> = raw.into_iter().collect();

        if let Some(shadow) = fields.shift_remove(ID_FIELD) {
            tracing::warn!(document_id = %id, shadow = %shadow, "dropping 'id' field that shadows the document id");
        }

        for (field, format) in &self.timestamps {
            if let Some(value) = fields.get_mut(field) {
                *value = normalize_timestamp(value, *format)
                    .map_err(|e| format!("field '{}': {}", field, e))?;
            }
        }

        for field in &self.geo_points {
            let Some(value) = fields.get(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let point = GeoPoint::from_value(value)
                .ok_or_else(|| format!("field '{}' is not a geo point", field))?;
            fields.insert("latitude".to_string(), json!(point.latitude));
            fields.insert("longitude".to_string(), json!(point.longitude));
        }

        for (field, default) in &self.defaults {
            let missing = match fields.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if missing {
                fields.insert(field.clone(), default.clone());
            }
        }

        Ok(ViewRecord::new(id, fields))
    }

    /// Normalize a whole result set, all or nothing
    ///
    /// The first undecodable document aborts the batch; duplicate identifiers
    /// are a decode failure as well.
    pub fn normalize_all(
        &self,
        collection: &str,
        docs: Vec<RawDocument>,
    ) -> Result<Vec<ViewRecord>, FetchError> {
        let mut seen = HashSet::with_capacity(docs.len());
        let mut records = Vec::with_capacity(docs.len());

        for doc in docs {
            let id = doc.id.clone();
            if !seen.insert(id.clone()) {
                return Err(FetchError::Decode {
                    collection: collection.to_string(),
                    document_id: Some(id),
                    message: "duplicate document id in result set".to_string(),
                });
            }
            let record = self.normalize(doc).map_err(|message| FetchError::Decode {
                collection: collection.to_string(),
                document_id: Some(id),
                message,
            })?;
            records.push(record);
        }

        Ok(records)
    }

    /// Bring timestamp fields of an outgoing patch into the local representation
    pub fn normalize_patch(&self, patch: &Patch) -> Result<Patch, ValidationError> {
        let mut local = patch.clone();
        for (field, value) in local.iter_mut() {
            if let Some(format) = self.timestamps.get(field) {
                *value = normalize_timestamp(value, *format).map_err(|message| {
                    ValidationError::InvalidValue {
                        field: field.clone(),
                        message,
                    }
                })?;
            }
        }
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alerts_spec() -> NormalizeSpec {
        NormalizeSpec::new()
            .timestamp("date", TimestampFormat::Date)
            .geo_point("location")
            .default_value("status", json!("Pending"))
    }

    #[test]
    fn test_normalize_dump_report() {
        let doc = RawDocument::from_json(
            "d1",
            json!({
                "date": {"seconds": 1748962200, "nanoseconds": 0},
                "location": {"latitude": 19.07, "longitude": 72.87},
                "locationDescription": "Behind the market",
            }),
        );

        let record = alerts_spec().normalize(doc).unwrap();
        assert_eq!(record.id, "d1");
        assert_eq!(record.get_str("date"), Some("2025-06-03"));
        assert_eq!(record.get_f64("latitude"), Some(19.07));
        assert_eq!(record.get_f64("longitude"), Some(72.87));
        assert_eq!(record.get_str("status"), Some("Pending"));
    }

    #[test]
    fn test_default_does_not_override_value() {
        let doc = RawDocument::from_json("d2", json!({"status": "Resolved"}));
        let record = alerts_spec().normalize(doc).unwrap();
        assert_eq!(record.get_str("status"), Some("Resolved"));

        let doc = RawDocument::from_json("d3", json!({"status": ""}));
        let record = alerts_spec().normalize(doc).unwrap();
        assert_eq!(record.get_str("status"), Some("Pending"));
    }

    #[test]
    fn test_shadowing_id_is_removed() {
        let doc = RawDocument::from_json("real", json!({"id": "fake", "name": "Ward 4"}));
        let record = NormalizeSpec::new().normalize(doc).unwrap();
        assert_eq!(record.id, "real");
        assert!(record.get("id").is_none());
    }

    #[test]
    fn test_missing_timestamp_stays_absent() {
        let doc = RawDocument::from_json("a1", json!({"status": "Present"}));
        let record = alerts_spec().normalize(doc).unwrap();
        assert!(record.get("date").is_none());
    }

    #[test]
    fn test_bad_document_aborts_batch() {
        let docs = vec![
            RawDocument::from_json("a1", json!({"date": "2025-06-03"})),
            RawDocument::from_json("a2", json!({"date": "not a date"})),
            RawDocument::from_json("a3", json!({"date": "2025-06-05"})),
        ];
        let err = alerts_spec().normalize_all("alerts", docs).unwrap_err();
        match err {
            FetchError::Decode { document_id, .. } => assert_eq!(document_id.as_deref(), Some("a2")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let docs = vec![
            RawDocument::from_json("a1", json!({})),
            RawDocument::from_json("a1", json!({})),
        ];
        assert!(NormalizeSpec::new().normalize_all("alerts", docs).is_err());
    }

    #[test]
    fn test_bad_geo_point_is_decode_failure() {
        let doc = RawDocument::from_json("d1", json!({"location": "somewhere"}));
        assert!(alerts_spec().normalize(doc).is_err());
    }

    #[test]
    fn test_normalize_patch_timestamps() {
        let patch = Patch::new()
            .set("date", json!({"seconds": 1748962200}))
            .set("status", json!("Resolved"));
        let local = alerts_spec().normalize_patch(&patch).unwrap();
        assert_eq!(local.get("date"), Some(&json!("2025-06-03")));
        assert_eq!(local.get("status"), Some(&json!("Resolved")));

        let bad = Patch::new().set("date", json!("soon"));
        assert!(alerts_spec().normalize_patch(&bad).is_err());
    }
}
