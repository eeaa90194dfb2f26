//! Normalized records and whole-field patches

use crate::core::error::ValidationError;
use crate::core::field::as_f64;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the identifier key; never stored inside `fields`
pub const ID_FIELD: &str = "id";

/// One remote document flattened together with its identifier
///
/// `fields` keeps the store's field order and never contains [`ID_FIELD`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub id: String,
    pub fields: IndexMap<String, Value>,
}

impl ViewRecord {
    pub fn new(id: impl Into<String>, mut fields: IndexMap<String, Value>) -> Self {
        fields.shift_remove(ID_FIELD);
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Raw field value, `None` when absent
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field as a string slice, `None` when absent or not a string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Field as a number; numeric strings are accepted
    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(as_f64)
    }

    /// Shallow merge: each named field is replaced wholesale, all others kept
    pub fn apply_patch(&mut self, patch: &Patch) {
        for (field, value) in patch.iter() {
            if field == ID_FIELD {
                continue;
            }
            self.fields.insert(field.clone(), value.clone());
        }
    }

    /// JSON object with the identifier folded back in, for renderers
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        for (field, value) in &self.fields {
            map.insert(field.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// A set of whole top-level fields to write
///
/// # Example
/// ```rust,ignore
/// let patch = Patch::new()
///     .set("status", json!("Assigned"))
///     .set("assignedCollectorId", json!(collector.id));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(IndexMap<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wire representation for [`DocumentStore`](crate::core::store::DocumentStore) calls
    pub fn to_map(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Check the patch before it is sent anywhere
    ///
    /// Field names must be whole top-level names: no `.` paths and no `$`
    /// operators. When `allowed` is given, every field must be listed in it.
    pub fn validate(&self, allowed: Option<&[String]>) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if self.0.contains_key(ID_FIELD) {
            return Err(ValidationError::ImmutableField {
                field: ID_FIELD.to_string(),
            });
        }
        if let Some(field) = self
            .0
            .keys()
            .find(|field| field.is_empty() || field.contains('.') || field.starts_with('$'))
        {
            return Err(ValidationError::NestedField {
                field: field.clone(),
            });
        }
        if let Some(allowed) = allowed {
            let unknown: Vec<String> = self
                .0
                .keys()
                .filter(|field| !allowed.iter().any(|a| a == *field))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(ValidationError::UnknownFields { fields: unknown });
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for Patch {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dump() -> ViewRecord {
        let mut fields = IndexMap::new();
        fields.insert("status".to_string(), json!("Pending"));
        fields.insert("area".to_string(), json!("North"));
        fields.insert("latitude".to_string(), json!(19.07));
        ViewRecord::new("d1", fields)
    }

    #[test]
    fn test_new_strips_id_field() {
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), json!("shadow"));
        fields.insert("name".to_string(), json!("Ward 1"));
        let record = ViewRecord::new("w1", fields);
        assert_eq!(record.id, "w1");
        assert!(record.get("id").is_none());
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn test_apply_patch_is_shallow_merge() {
        let mut record = dump();
        let before = record.clone();
        record.apply_patch(&Patch::new().set("status", json!("Resolved")));

        assert_eq!(record.get_str("status"), Some("Resolved"));
        assert_eq!(record.get("area"), before.get("area"));
        assert_eq!(record.get("latitude"), before.get("latitude"));
        assert_eq!(record.id, before.id);
    }

    #[test]
    fn test_apply_patch_replaces_nested_value_whole() {
        let mut record = dump();
        record.apply_patch(&Patch::new().set("photos", json!({"before": "a.jpg"})));
        record.apply_patch(&Patch::new().set("photos", json!({"after": "b.jpg"})));
        assert_eq!(record.get("photos"), Some(&json!({"after": "b.jpg"})));
    }

    #[test]
    fn test_patch_validation() {
        assert_eq!(Patch::new().validate(None), Err(ValidationError::EmptyPatch));

        let patch = Patch::new().set("id", json!("other"));
        assert!(matches!(
            patch.validate(None),
            Err(ValidationError::ImmutableField { .. })
        ));

        for field in ["photos.after", "$set", ""] {
            let patch = Patch::new().set(field, json!("b.jpg"));
            assert_eq!(
                patch.validate(None),
                Err(ValidationError::NestedField {
                    field: field.to_string()
                })
            );
        }

        let allowed = vec!["status".to_string()];
        let patch = Patch::new()
            .set("status", json!("Resolved"))
            .set("colour", json!("red"));
        assert_eq!(
            patch.validate(Some(&allowed)),
            Err(ValidationError::UnknownFields {
                fields: vec!["colour".to_string()]
            })
        );
        assert!(
            Patch::new()
                .set("status", json!("Resolved"))
                .validate(Some(&allowed))
                .is_ok()
        );
    }

    #[test]
    fn test_to_json_includes_id() {
        let json = dump().to_json();
        assert_eq!(json["id"], "d1");
        assert_eq!(json["status"], "Pending");
    }
}
