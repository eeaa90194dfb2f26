//! Field value helpers: timestamp normalization, geo points and grouping keys

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::OnceLock;

/// Fixed representation for normalized timestamp fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// `YYYY-MM-DD` (UTC calendar date)
    #[default]
    Date,
    /// RFC 3339 in UTC with second precision, e.g. `2025-06-03T14:50:00Z`
    DateTime,
    /// Milliseconds since the Unix epoch, as a JSON number
    EpochMillis,
}

impl TimestampFormat {
    /// Render a timestamp in this format
    pub fn format(&self, ts: DateTime<Utc>) -> Value {
        match self {
            TimestampFormat::Date => Value::String(ts.format("%Y-%m-%d").to_string()),
            TimestampFormat::DateTime => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            TimestampFormat::EpochMillis => json!(ts.timestamp_millis()),
        }
    }
}

fn iso_date_regex() -> &'static Regex {
    static ISO_DATE: OnceLock<Regex> = OnceLock::new();
    ISO_DATE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

fn naive_datetime_regex() -> &'static Regex {
    static NAIVE: OnceLock<Regex> = OnceLock::new();
    NAIVE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?$").unwrap())
}

/// Interpret a raw field value as an instant
///
/// Accepted shapes:
/// - `{seconds, nanoseconds}` or `{_seconds, _nanoseconds}`
/// - `{"$date": <rfc3339 | millis | {"$numberLong": "..."}>}`
/// - RFC 3339 strings, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` (UTC assumed)
/// - integer epoch milliseconds
///
/// Returns `Ok(None)` for `null`.
pub fn parse_timestamp(value: &Value) -> Result<Option<DateTime<Utc>>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| format!("epoch value {} is not an integer", n))?;
            DateTime::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(|| format!("epoch value {} is out of range", millis))
        }
        Value::String(s) => parse_timestamp_str(s).map(Some),
        Value::Object(map) => {
            if let Some(inner) = map.get("$date") {
                return match inner {
                    Value::Object(long) => match long.get("$numberLong").and_then(Value::as_str) {
                        Some(raw) => {
                            let millis: i64 = raw
                                .parse()
                                .map_err(|_| format!("invalid $numberLong '{}'", raw))?;
                            parse_timestamp(&json!(millis))
                        }
                        None => Err("unsupported $date shape".to_string()),
                    },
                    other => parse_timestamp(other),
                };
            }

            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64);
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);

            let nanos = u32::try_from(nanos)
                .map_err(|_| format!("nanoseconds {} is out of range", nanos))?;

            match seconds {
                Some(secs) => DateTime::from_timestamp(secs, nanos)
                    .map(Some)
                    .ok_or_else(|| format!("timestamp {}s is out of range", secs)),
                None => Err("object is not a timestamp".to_string()),
            }
        }
        other => Err(format!("{} is not a timestamp", type_name(other))),
    }
}

fn parse_timestamp_str(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if iso_date_regex().is_match(s) {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| format!("invalid date '{}': {}", s, e))
            .and_then(|d| {
                d.and_hms_opt(0, 0, 0)
                    .map(|naive| naive.and_utc())
                    .ok_or_else(|| format!("invalid date '{}'", s))
            });
    }
    if naive_datetime_regex().is_match(s) {
        let normalized = s.replacen(' ', "T", 1);
        for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, pattern) {
                return Ok(naive.and_utc());
            }
        }
    }
    Err(format!("unrecognized date/time '{}'", s))
}

/// Normalize a raw timestamp value into the given format
///
/// `null` stays `null`; anything unparseable is an error so the caller can
/// abort the load instead of keeping an opaque handle.
pub fn normalize_timestamp(value: &Value, format: TimestampFormat) -> Result<Value, String> {
    Ok(match parse_timestamp(value)? {
        Some(ts) => format.format(ts),
        None => Value::Null,
    })
}

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Read a geo point from `{latitude, longitude}`, `{_latitude, _longitude}`
    /// or `{lat, lng}`
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let pick = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(as_f64));
        let latitude = pick(&["latitude", "_latitude", "lat"])?;
        let longitude = pick(&["longitude", "_longitude", "lng", "lon"])?;
        Some(Self::new(latitude, longitude))
    }
}

/// Numeric view of a value; numeric strings are accepted
pub fn as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}

/// Label used when grouping by a value; `None` for absent-like values
pub fn key_label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
