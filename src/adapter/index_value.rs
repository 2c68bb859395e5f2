//! Canonical index encoding for property values.
//!
//! Scalars are written directly. Keys, dates, times and datetimes carry a
//! magic prefix so a generic index reader can tell them apart from plain
//! strings without consulting a schema. Datetimes are stored as epoch
//! seconds (UTC); sub-second precision is not indexed.

use chrono::{DateTime, NaiveDate, NaiveTime};

use crate::key::Key;
use crate::schema::Value;

pub const KEY_PREFIX: &str = "__key__::";
pub const DATE_PREFIX: &str = "__date__::";
pub const TIME_PREFIX: &str = "__time__::";
pub const DATETIME_PREFIX: &str = "__datetime__::";

/// Index form of a value. Nulls, lists, nested records and incomplete keys
/// are not indexable.
pub fn encode_index_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Record(_) | Value::List(_) => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Int(i) => Some(i.to_string()),
        // -0.0 compares equal to 0.0, so both share one index value
        Value::Float(f) if *f == 0.0 => Some(0.0f64.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Key(key) => key
            .urlsafe()
            .ok()
            .map(|encoded| format!("{}{}", KEY_PREFIX, encoded)),
        Value::Date(date) => Some(format!("{}{}", DATE_PREFIX, date)),
        Value::Time(time) => Some(format!("{}{}", TIME_PREFIX, time)),
        Value::DateTime(dt) => Some(format!("{}{}", DATETIME_PREFIX, dt.and_utc().timestamp())),
    }
}

/// Reverse of [`encode_index_value`] for tagged values; anything untagged
/// (or malformed) reads back as a string.
pub fn decode_index_value(encoded: &str) -> Value {
    let tagged = if let Some(rest) = encoded.strip_prefix(KEY_PREFIX) {
        Key::from_urlsafe(rest).ok().map(Value::Key)
    } else if let Some(rest) = encoded.strip_prefix(DATE_PREFIX) {
        rest.parse::<NaiveDate>().ok().map(Value::Date)
    } else if let Some(rest) = encoded.strip_prefix(TIME_PREFIX) {
        rest.parse::<NaiveTime>().ok().map(Value::Time)
    } else if let Some(rest) = encoded.strip_prefix(DATETIME_PREFIX) {
        rest.parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| Value::DateTime(dt.naive_utc()))
    } else {
        None
    };
    tagged.unwrap_or_else(|| Value::String(encoded.to_string()))
}
