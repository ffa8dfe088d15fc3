//! # Response Encoding
//!
//! Loss-free wire encoding for callers that identify themselves as a generated
//! client. Every date leaf becomes a tagged wrapper:
//!
//! ```json
//! { "createdAt": { "$date": "2023-07-09T00:00:00Z" } }
//! ```
//!
//! [`decode_tagged`] is the paired client decoder: it turns the wrappers back
//! into [`Value::Date`] so the caller sees the same value the handler returned.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use schemaroute::encoding::{decode_tagged, encode_tagged};
//! use schemaroute::Value;
//!
//! let original = Value::object([("at", Value::from(Utc.timestamp_opt(0, 0).unwrap()))]);
//! assert_eq!(decode_tagged(encode_tagged(&original)), original);
//! ```

use crate::value::{format_date, Value};
use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Request header a generated client sets to opt into tagged encoding.
pub const CLIENT_MARKER_HEADER: &str = "api-client";

/// Key of the date wrapper object.
pub const DATE_TAG: &str = "$date";

/// `true` when the request carries a non-empty [`CLIENT_MARKER_HEADER`].
#[must_use]
pub fn is_generated_client(headers: &HeaderMap) -> bool {
    headers
        .get(CLIENT_MARKER_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty())
}

/// Encode a value for a generated client, tagging every date leaf.
#[must_use]
pub fn encode_tagged(value: &Value) -> JsonValue {
    match value {
        Value::Date(d) => {
            let mut wrapper = JsonMap::with_capacity(1);
            wrapper.insert(DATE_TAG.to_string(), JsonValue::String(format_date(d)));
            JsonValue::Object(wrapper)
        }
        Value::Array(items) => JsonValue::Array(items.iter().map(encode_tagged).collect()),
        Value::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), encode_tagged(v)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

/// Decode a tagged payload back into a [`Value`].
///
/// An object whose `$date` entry is a parseable timestamp string becomes a
/// date. Objects with an unparseable `$date` are left as plain objects.
#[must_use]
pub fn decode_tagged(value: JsonValue) -> Value {
    match value {
        JsonValue::Array(items) => Value::Array(items.into_iter().map(decode_tagged).collect()),
        JsonValue::Object(map) => {
            if let Some(date) = map
                .get(DATE_TAG)
                .and_then(JsonValue::as_str)
                .and_then(parse_date)
            {
                return Value::Date(date);
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, decode_tagged(v)))
                    .collect(),
            )
        }
        other => Value::from(other),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
