//! Wire format for job timestamps.
//!
//! Job records exchanged as JSON carry ISO-8601 UTC timestamps with
//! millisecond precision and a literal `Z` suffix, e.g.
//! `2024-05-01T12:00:00.123Z`. Unset timestamps are the empty string.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_millis(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp and normalise it to UTC.
pub fn parse_millis(value: &str) -> Result<Timestamp, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|source| CoreError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

/// Format an optional timestamp, using `""` for `None`.
pub fn format_optional(ts: Option<&Timestamp>) -> String {
    ts.map(format_millis).unwrap_or_default()
}

/// Parse an optional timestamp where `""` means unset.
pub fn parse_optional(value: &str) -> Result<Option<Timestamp>, CoreError> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_millis(value).map(Some)
    }
}

/// Truncate a timestamp to whole milliseconds so that a value written
/// to the wire format reads back unchanged.
pub fn truncate_millis(ts: Timestamp) -> Timestamp {
    let millis = ts.timestamp_millis();
    DateTime::from_timestamp_millis(millis).unwrap_or(ts)
}

/// `#[serde(with = "...")]` adapter for required timestamps.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::Timestamp;

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_millis(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_millis(&raw).map_err(serde::de::Error::custom)
    }
}

/// `#[serde(with = "...")]` adapter for optional timestamps encoded as
/// `""` when unset.
pub mod millis_or_empty {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::Timestamp;

    pub fn serialize<S: Serializer>(
        ts: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_optional(ts.as_ref()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_optional(&raw).map_err(serde::de::Error::custom)
    }
}
