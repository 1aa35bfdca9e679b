//! Column encodings shared by the repositories.

use std::time::Duration;

use chrono::SecondsFormat;
use serde::Serialize;
use serde::de::DeserializeOwned;

use guildwarden_domain::time::Timestamp;

use crate::error::StorageError;

/// Platform snowflakes are bit-cast into `SQLite`'s signed integers.
pub(crate) fn snowflake(raw: u64) -> i64 {
    raw.cast_signed()
}

pub(crate) fn from_snowflake<T: From<u64>>(raw: i64) -> T {
    T::from(raw.cast_unsigned())
}

/// Fixed-width UTC form: text order equals time order.
pub(crate) fn timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.to_utc())
        .map_err(decode)
}

pub(crate) fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn from_millis(value: i64) -> Result<Duration, sqlx::Error> {
    u64::try_from(value).map(Duration::from_millis).map_err(decode)
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn from_json<T: DeserializeOwned>(value: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(value).map_err(decode)
}

pub(crate) fn decode(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> sqlx::Error {
    sqlx::Error::Decode(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_snowflakes_above_i64_max() {
        let raw = u64::MAX - 7;
        let back: guildwarden_domain::id::UserId = from_snowflake(snowflake(raw));
        assert_eq!(back.get(), raw);
    }

    #[test]
    fn should_order_timestamps_as_text() {
        let early = parse_timestamp("2024-01-01T10:00:00.5Z").unwrap();
        let late = parse_timestamp("2024-01-01T10:00:01Z").unwrap();
        assert!(timestamp(early) < timestamp(late));
        assert_eq!(timestamp(early).len(), timestamp(late).len());
    }

    #[test]
    fn should_reject_negative_millis() {
        assert!(from_millis(-1).is_err());
        assert_eq!(from_millis(1_500).unwrap(), Duration::from_millis(1_500));
    }
}
