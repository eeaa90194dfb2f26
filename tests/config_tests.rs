//! Tests for loading and merging console configuration files

use std::io::Write;
use tempfile::NamedTempFile;
use wardview::config::{ConsoleConfig, resources};
use wardview::core::{Direction, TimestampFormat};

const OVERRIDES: &str = r#"
resources:
  - name: dumps
    label: dump reports
    query:
      collection: alerts_v2
      order_by: { field: reportedAt, direction: desc }
    normalize:
      timestamps: { reportedAt: date_time }
      geo_points: [location]
      defaults: { status: Pending }
    mutable_fields: [status]
    timeout_ms: 5000
map:
  default_center: { latitude: 19.076, longitude: 72.8777 }
  default_zoom: 11
  focused_zoom: 14
unknown_label: Unknown Area
"#;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(OVERRIDES.as_bytes()).unwrap();

    let config = ConsoleConfig::from_yaml_file(file.path()).unwrap();
    let dumps = config.resource(resources::DUMPS).unwrap();

    assert_eq!(dumps.collection(), "alerts_v2");
    assert_eq!(dumps.query.order_by.as_ref().unwrap().direction, Direction::Desc);
    assert_eq!(
        dumps.normalize.timestamps.get("reportedAt"),
        Some(&TimestampFormat::DateTime)
    );
    assert_eq!(dumps.timeout_ms, Some(5000));
    assert_eq!(config.map.default_zoom, 11);
    assert_eq!(config.unknown_label, "Unknown Area");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ConsoleConfig::from_yaml_file(dir.path().join("console.yaml")).is_err());
}

#[test]
fn test_merge_overrides_by_name() {
    let overrides = ConsoleConfig::from_yaml_str(OVERRIDES).unwrap();
    let merged = ConsoleConfig::merge(vec![ConsoleConfig::default_config(), overrides]);

    assert_eq!(merged.resources.len(), 8);
    assert_eq!(merged.resource(resources::DUMPS).unwrap().collection(), "alerts_v2");
    assert_eq!(
        merged.resource(resources::ATTENDANCE).unwrap().collection(),
        "attendance"
    );
    assert_eq!(merged.unknown_label, "Unknown Area");
    assert!(merged.validate().is_ok());
}

#[test]
fn test_zero_timeout_rejected() {
    let yaml = r#"
resources:
  - name: wards
    label: wards
    query: { collection: wards }
    timeout_ms: 0
"#;
    let err = ConsoleConfig::from_yaml_str(yaml).unwrap_err();
    assert!(err.to_string().contains("timeout_ms"));
}
