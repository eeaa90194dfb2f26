//! Pure derivations over a record set: filters, buckets, metrics, centroid
//!
//! Everything here is synchronous and deterministic. Given the same records
//! and the same [`DeriveSpec`], [`derive`] returns deep-equal output; nothing
//! reads the clock or a random source.
//!
//! # Policies
//!
//! - Records whose grouping key is absent, null or blank land in a sentinel
//!   bucket (default [`UNKNOWN_LABEL`]) so bucket counts always add up to the
//!   number of grouped records.
//! - Month buckets are ordered by `(year, month)` and formatted afterwards
//!   (`"June 2025"`); the sentinel bucket comes last.
//! - Percentages and averages go through [`percentage`] / [`average`]: a zero
//!   denominator yields `0.0`, and results are rounded with [`round1`].

use crate::core::error::ValidationError;
use crate::core::field::{GeoPoint, key_label, parse_timestamp};
use crate::core::record::ViewRecord;
use chrono::{Datelike, NaiveDate};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sentinel bucket label for records without a grouping key
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Round to one decimal place, half away from zero; non-finite input gives 0
pub fn round1(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0).round() / 10.0
}

/// `part / whole * 100`, rounded; 0 when `whole` is 0
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

/// `sum / count`, rounded; 0 when `count` is 0
pub fn average(sum: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round1(sum / count as f64)
}

// =============================================================================
// Filter predicates
// =============================================================================

/// A pure `ViewRecord → bool` test
///
/// String comparisons other than [`FilterPredicate::Eq`] ignore case, which is
/// how console pages compare statuses and areas typed by humans.
#[derive(Debug, Clone)]
pub enum FilterPredicate {
    /// Matches every record
    Always,
    /// Exact JSON equality
    Eq { field: String, value: Value },
    /// Case-insensitive string equality
    EqIgnoreCase { field: String, value: String },
    /// Case-insensitive membership in a list
    OneOf { field: String, values: Vec<String> },
    /// Case-insensitive substring
    Contains { field: String, needle: String },
    /// Regular expression on a string field
    Matches { field: String, pattern: Regex },
    /// Field present and not null
    Present { field: String },
    And(Vec<FilterPredicate>),
    Or(Vec<FilterPredicate>),
    Not(Box<FilterPredicate>),
}

impl FilterPredicate {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        FilterPredicate::Eq {
            field: field.into(),
            value,
        }
    }

    pub fn eq_ignore_case(field: impl Into<String>, value: impl Into<String>) -> Self {
        FilterPredicate::EqIgnoreCase {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn one_of<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterPredicate::OneOf {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        FilterPredicate::Contains {
            field: field.into(),
            needle: needle.into(),
        }
    }

    /// Compile a pattern predicate; an invalid pattern is a validation error
    pub fn matches(field: impl Into<String>, pattern: &str) -> Result<Self, ValidationError> {
        let field = field.into();
        let pattern = Regex::new(pattern).map_err(|e| ValidationError::InvalidValue {
            field: field.clone(),
            message: e.to_string(),
        })?;
        Ok(FilterPredicate::Matches { field, pattern })
    }

    pub fn present(field: impl Into<String>) -> Self {
        FilterPredicate::Present {
            field: field.into(),
        }
    }

    pub fn negate(self) -> Self {
        FilterPredicate::Not(Box::new(self))
    }

    /// Evaluate against one record
    pub fn test(&self, record: &ViewRecord) -> bool {
        match self {
            FilterPredicate::Always => true,
            FilterPredicate::Eq { field, value } => record.get(field) == Some(value),
            FilterPredicate::EqIgnoreCase { field, value } => record
                .get_str(field)
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(value.trim())),
            FilterPredicate::OneOf { field, values } => record.get_str(field).is_some_and(|s| {
                values
                    .iter()
                    .any(|v| s.trim().eq_ignore_ascii_case(v.trim()))
            }),
            FilterPredicate::Contains { field, needle } => record
                .get_str(field)
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            FilterPredicate::Matches { field, pattern } => {
                record.get_str(field).is_some_and(|s| pattern.is_match(s))
            }
            FilterPredicate::Present { field } => record.get(field).is_some_and(|v| !v.is_null()),
            FilterPredicate::And(all) => all.iter().all(|p| p.test(record)),
            FilterPredicate::Or(any) => any.iter().any(|p| p.test(record)),
            FilterPredicate::Not(inner) => !inner.test(record),
        }
    }
}

// =============================================================================
// Groupings
// =============================================================================

/// What a grouping keys on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// The field's value, as a label
    Field(String),
    /// Calendar month of a timestamp field
    Month(String),
}

/// Bucket ordering for [`GroupKey::Field`] groupings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketOrder {
    /// Natural key order: numeric keys numerically, others case-insensitively
    #[default]
    Key,
    /// Largest bucket first, ties by key
    CountDesc,
    /// Order of first appearance in the record set
    FirstSeen,
}

/// One grouping dimension of a [`DeriveSpec`]
#[derive(Debug, Clone)]
pub struct Grouping {
    pub name: String,
    pub key: GroupKey,
    pub order: BucketOrder,
    /// When set, each bucket also counts the records matching this predicate
    pub tally: Option<FilterPredicate>,
    pub unknown_label: String,
}

impl Grouping {
    pub fn field(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::with_key(name, GroupKey::Field(field.into()))
    }

    pub fn month(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::with_key(name, GroupKey::Month(field.into()))
    }

    fn with_key(name: impl Into<String>, key: GroupKey) -> Self {
        Self {
            name: name.into(),
            key,
            order: BucketOrder::default(),
            tally: None,
            unknown_label: UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn order(mut self, order: BucketOrder) -> Self {
        self.order = order;
        self
    }

    pub fn tally(mut self, predicate: FilterPredicate) -> Self {
        self.tally = Some(predicate);
        self
    }

    pub fn unknown_label(mut self, label: impl Into<String>) -> Self {
        self.unknown_label = label.into();
        self
    }
}

/// A grouping key and the number of records falling into it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub key: String,
    pub count: usize,
    /// Records matching the grouping's tally predicate, if it has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<usize>,
}

impl Bucket {
    /// Share of matched records in this bucket, as a rounded percentage
    pub fn rate(&self) -> f64 {
        percentage(self.matched.unwrap_or(0), self.count)
    }
}

#[derive(Default)]
struct Tally {
    count: usize,
    matched: usize,
}

impl Tally {
    fn add(&mut self, hit: bool) {
        self.count += 1;
        if hit {
            self.matched += 1;
        }
    }

    fn into_bucket(self, key: String, tallied: bool) -> Bucket {
        Bucket {
            key,
            count: self.count,
            matched: tallied.then_some(self.matched),
        }
    }
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b)),
    }
}

/// Month label for a `(year, month)` pair, e.g. `"June 2025"`
pub fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_else(|| format!("{:04}-{:02}", year, month))
}

/// Calendar month of a timestamp-like value
pub fn month_of(value: &Value) -> Option<(i32, u32)> {
    parse_timestamp(value)
        .ok()
        .flatten()
        .map(|ts| (ts.year(), ts.month()))
}

fn group(records: &[ViewRecord], grouping: &Grouping) -> Vec<Bucket> {
    let tallied = grouping.tally.is_some();
    let hit = |record: &ViewRecord| grouping.tally.as_ref().is_some_and(|p| p.test(record));
    let mut unknown = Tally::default();

    let mut buckets = match &grouping.key {
        GroupKey::Month(field) => {
            let mut months: BTreeMap<(i32, u32), Tally> = BTreeMap::new();
            for record in records {
                match record.get(field).and_then(month_of) {
                    Some(month) => months.entry(month).or_default().add(hit(record)),
                    None => unknown.add(hit(record)),
                }
            }
            months
                .into_iter()
                .map(|((year, month), tally)| tally.into_bucket(month_label(year, month), tallied))
                .collect::<Vec<_>>()
        }
        GroupKey::Field(field) => {
            let mut keys: IndexMap<String, Tally> = IndexMap::new();
            for record in records {
                match record.get(field).and_then(key_label) {
                    Some(key) if key != grouping.unknown_label => {
                        keys.entry(key).or_default().add(hit(record))
                    }
                    _ => unknown.add(hit(record)),
                }
            }
            let mut buckets: Vec<Bucket> = keys
                .into_iter()
                .map(|(key, tally)| tally.into_bucket(key, tallied))
                .collect();
            match grouping.order {
                BucketOrder::Key => buckets.sort_by(|a, b| natural_cmp(&a.key, &b.key)),
                BucketOrder::CountDesc => buckets.sort_by(|a, b| {
                    b.count
                        .cmp(&a.count)
                        .then_with(|| natural_cmp(&a.key, &b.key))
                }),
                BucketOrder::FirstSeen => {}
            }
            buckets
        }
    };

    if unknown.count > 0 {
        buckets.push(unknown.into_bucket(grouping.unknown_label.clone(), tallied));
    }
    buckets
}

// =============================================================================
// Metrics
// =============================================================================

/// Scalar aggregates over the visible records
#[derive(Debug, Clone)]
pub enum Metric {
    /// Number of visible records
    Count,
    /// Percentage of visible records matching the predicate
    Ratio(FilterPredicate),
    /// Mean of a numeric field; non-numeric or missing values count as 0
    Average(String),
    /// Sum of a numeric field
    Sum(String),
}

impl Metric {
    fn evaluate(&self, records: &[ViewRecord]) -> f64 {
        match self {
            Metric::Count => records.len() as f64,
            Metric::Ratio(predicate) => {
                let matched = records.iter().filter(|r| predicate.test(r)).count();
                percentage(matched, records.len())
            }
            Metric::Average(field) => {
                let sum: f64 = records.iter().filter_map(|r| r.get_f64(field)).sum();
                average(sum, records.len())
            }
            Metric::Sum(field) => round1(records.iter().filter_map(|r| r.get_f64(field)).sum()),
        }
    }
}

/// Average position of the records carrying numeric `latitude` and `longitude`
pub fn centroid(records: &[ViewRecord]) -> Option<GeoPoint> {
    let points: Vec<GeoPoint> = records
        .iter()
        .filter_map(|r| Some(GeoPoint::new(r.get_f64("latitude")?, r.get_f64("longitude")?)))
        .collect();
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    Some(GeoPoint::new(
        points.iter().map(|p| p.latitude).sum::<f64>() / n,
        points.iter().map(|p| p.longitude).sum::<f64>() / n,
    ))
}

// =============================================================================
// Derive
// =============================================================================

/// Everything a page wants computed from its records
#[derive(Debug, Clone, Default)]
pub struct DeriveSpec {
    pub filter: Option<FilterPredicate>,
    pub groupings: Vec<Grouping>,
    pub metrics: Vec<(String, Metric)>,
    pub centroid: bool,
}

impl DeriveSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: FilterPredicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    pub fn group(mut self, grouping: Grouping) -> Self {
        self.groupings.push(grouping);
        self
    }

    pub fn group_by(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.group(Grouping::field(name, field))
    }

    pub fn metric(mut self, name: impl Into<String>, metric: Metric) -> Self {
        self.metrics.push((name.into(), metric));
        self
    }

    pub fn with_centroid(mut self) -> Self {
        self.centroid = true;
        self
    }
}

/// Output of [`derive`]
///
/// Groupings, metrics and the centroid are computed over `visible`, which is
/// always `records.filter(spec.filter)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedView {
    pub visible: Vec<ViewRecord>,
    /// Size of the unfiltered input
    pub total: usize,
    pub groupings: IndexMap<String, Vec<Bucket>>,
    pub metrics: IndexMap<String, f64>,
    pub centroid: Option<GeoPoint>,
}

impl DerivedView {
    /// Buckets of a grouping, empty when the grouping is unknown
    pub fn buckets(&self, grouping: &str) -> &[Bucket] {
        self.groupings
            .get(grouping)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn bucket(&self, grouping: &str, key: &str) -> Option<&Bucket> {
        self.buckets(grouping).iter().find(|b| b.key == key)
    }

    /// Metric value, 0 when the metric was not requested
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }

    /// True when the filter left nothing to show
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}

/// Compute a [`DerivedView`] from a record set
pub fn derive(records: &[ViewRecord], spec: &DeriveSpec) -> DerivedView {
    let visible: Vec<ViewRecord> = match &spec.filter {
        Some(predicate) => records.iter().filter(|r| predicate.test(r)).cloned().collect(),
        None => records.to_vec(),
    };

    let groupings = spec
        .groupings
        .iter()
        .map(|g| (g.name.clone(), group(&visible, g)))
        .collect();

    let metrics = spec
        .metrics
        .iter()
        .map(|(name, metric)| (name.clone(), metric.evaluate(&visible)))
        .collect();

    let centroid = if spec.centroid {
        centroid(&visible)
    } else {
        None
    };

    DerivedView {
        total: records.len(),
        visible,
        groupings,
        metrics,
        centroid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, fields: Value) -> ViewRecord {
        let map = fields
            .as_object()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect();
        ViewRecord::new(id, map)
    }

    #[test]
    fn test_round1_policy() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(66.64), 66.6);
        assert_eq!(round1(2.25), 2.3);
        assert_eq!(round1(-2.25), -2.3);
        assert_eq!(round1(f64::NAN), 0.0);
        assert_eq!(round1(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_zero_denominators() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(average(10.0, 0), 0.0);
        assert_eq!(percentage(2, 3), 66.7);
    }

    #[test]
    fn test_bucket_counts_sum_to_input() {
        let records = vec![
            record("1", json!({"area": "North"})),
            record("2", json!({"area": "South"})),
            record("3", json!({"area": null})),
            record("4", json!({})),
            record("5", json!({"area": "north "})),
            record("6", json!({"area": "  "})),
        ];
        let view = derive(&records, &DeriveSpec::new().group_by("area", "area"));
        let sum: usize = view.buckets("area").iter().map(|b| b.count).sum();
        assert_eq!(sum, records.len());
        assert_eq!(view.bucket("area", UNKNOWN_LABEL).unwrap().count, 3);
    }

    #[test]
    fn test_custom_unknown_label() {
        let records = vec![record("1", json!({})), record("2", json!({"area": "East"}))];
        let spec = DeriveSpec::new().group(Grouping::field("area", "area").unknown_label("Unknown Area"));
        let view = derive(&records, &spec);
        assert_eq!(view.buckets("area")[1].key, "Unknown Area");
    }

    #[test]
    fn test_natural_key_order() {
        let records = vec![
            record("1", json!({"ward": "10"})),
            record("2", json!({"ward": "9"})),
            record("3", json!({"ward": "2"})),
        ];
        let view = derive(&records, &DeriveSpec::new().group_by("ward", "ward"));
        let keys: Vec<&str> = view.buckets("ward").iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["2", "9", "10"]);
    }

    #[test]
    fn test_count_desc_order() {
        let records = vec![
            record("1", json!({"area": "B"})),
            record("2", json!({"area": "A"})),
            record("3", json!({"area": "B"})),
        ];
        let spec = DeriveSpec::new().group(Grouping::field("area", "area").order(BucketOrder::CountDesc));
        let view = derive(&records, &spec);
        assert_eq!(view.buckets("area")[0].key, "B");
        assert_eq!(view.buckets("area")[0].count, 2);
    }

    #[test]
    fn test_months_sort_chronologically() {
        // lexical order would put "July 2025" before "January 2025"
        let records = vec![
            record("1", json!({"date": "2025-07-14"})),
            record("2", json!({"date": "2024-08-02"})),
            record("3", json!({"date": "2024-12-31"})),
            record("4", json!({"date": "2025-01-01"})),
        ];
        let view = derive(&records, &DeriveSpec::new().group(Grouping::month("monthly", "date")));
        let keys: Vec<&str> = view.buckets("monthly").iter().map(|b| b.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["August 2024", "December 2024", "January 2025", "July 2025"]
        );
    }

    #[test]
    fn test_month_without_date_goes_to_sentinel_last() {
        let records = vec![
            record("1", json!({"date": null})),
            record("2", json!({"date": "2025-06-03"})),
        ];
        let view = derive(&records, &DeriveSpec::new().group(Grouping::month("monthly", "date")));
        let buckets = view.buckets("monthly");
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].key, "June 2025");
        assert_eq!(buckets[1].key, UNKNOWN_LABEL);
    }

    #[test]
    fn test_empty_input_metrics_are_zero() {
        let spec = DeriveSpec::new()
            .metric("presence", Metric::Ratio(FilterPredicate::eq_ignore_case("status", "present")))
            .metric("rating", Metric::Average("totalRating".to_string()))
            .with_centroid();
        let view = derive(&[], &spec);
        assert_eq!(view.metric("presence"), 0.0);
        assert_eq!(view.metric("rating"), 0.0);
        assert!(view.centroid.is_none());
        assert!(view.is_empty());
    }

    #[test]
    fn test_derive_is_deterministic() {
        let records = vec![
            record("1", json!({"status": "Present", "date": "2025-06-03", "area": "N"})),
            record("2", json!({"status": "Absent", "date": "2025-07-01"})),
        ];
        let spec = DeriveSpec::new()
            .group(Grouping::month("monthly", "date").tally(FilterPredicate::eq("status", json!("Present"))))
            .group(Grouping::field("area", "area").order(BucketOrder::FirstSeen))
            .metric("count", Metric::Count);
        assert_eq!(derive(&records, &spec), derive(&records, &spec));
    }

    #[test]
    fn test_filter_defines_visible_set() {
        let records = vec![
            record("1", json!({"area": "Kothrud"})),
            record("2", json!({"area": "Baner"})),
            record("3", json!({"area": "kothrud east"})),
        ];
        let view = derive(
            &records,
            &DeriveSpec::new().filter(FilterPredicate::contains("area", "KOTH")),
        );
        assert_eq!(view.total, 3);
        let ids: Vec<&str> = view.visible.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_predicates() {
        let r = record("1", json!({"status": " Pending ", "area": "Ward 12"}));
        assert!(FilterPredicate::eq_ignore_case("status", "pending").test(&r));
        assert!(FilterPredicate::one_of("status", ["Assigned", "PENDING"]).test(&r));
        assert!(FilterPredicate::matches("area", r"^Ward \d+$").unwrap().test(&r));
        assert!(FilterPredicate::matches("area", "(").is_err());
        assert!(FilterPredicate::present("area").test(&r));
        assert!(FilterPredicate::present("missing").negate().test(&r));
        assert!(
            FilterPredicate::And(vec![
                FilterPredicate::Always,
                FilterPredicate::Or(vec![
                    FilterPredicate::eq("area", json!("Ward 1")),
                    FilterPredicate::eq("area", json!("Ward 12")),
                ]),
            ])
            .test(&r)
        );
    }

    #[test]
    fn test_centroid() {
        let records = vec![
            record("1", json!({"latitude": 10.0, "longitude": 70.0})),
            record("2", json!({"latitude": 20.0, "longitude": 80.0})),
            record("3", json!({"latitude": null, "longitude": 99.0})),
        ];
        let point = centroid(&records).unwrap();
        assert_eq!(point, GeoPoint::new(15.0, 75.0));
    }

    #[test]
    fn test_average_counts_missing_as_zero() {
        let records = vec![
            record("1", json!({"totalRating": 4})),
            record("2", json!({"totalRating": 5})),
            record("3", json!({})),
        ];
        let view = derive(
            &records,
            &DeriveSpec::new().metric("rating", Metric::Average("totalRating".to_string())),
        );
        assert_eq!(view.metric("rating"), 3.0);
    }
}
