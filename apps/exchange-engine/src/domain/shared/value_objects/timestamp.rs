//! Timestamp value object for temporal data.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC timestamp with microsecond precision.
///
/// Stored and serialized as RFC 3339 text; ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a new Timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub const fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse from an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid RFC 3339 timestamp.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(dt.with_timezone(&Utc)))
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Format as RFC 3339 with microsecond precision (storage form).
    #[must_use]
    pub fn to_rfc3339_micros(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Get the Unix timestamp in seconds.
    #[must_use]
    pub const fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Shift forward by a whole number of seconds.
    #[must_use]
    pub fn plus_seconds(&self, seconds: u32) -> Self {
        Self(self.0 + Duration::seconds(i64::from(seconds)))
    }

    /// Shift backward by a whole number of seconds.
    #[must_use]
    pub fn minus_seconds(&self, seconds: u32) -> Self {
        Self(self.0 - Duration::seconds(i64::from(seconds)))
    }

    /// Duration elapsed from `other` to `self`.
    #[must_use]
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0 - other.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339_micros())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parse_roundtrip() {
        let ts = Timestamp::parse("2026-07-01T12:00:00.000123Z").unwrap();
        assert_eq!(ts.to_rfc3339_micros(), "2026-07-01T12:00:00.000123Z");
    }

    #[test]
    fn timestamp_parse_rejects_garbage() {
        assert!(Timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn timestamp_ordering_is_chronological() {
        let earlier = Timestamp::parse("2026-07-01T12:00:00Z").unwrap();
        let later = Timestamp::parse("2026-07-01T12:00:01Z").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn timestamp_plus_and_minus_seconds() {
        let ts = Timestamp::parse("2026-07-01T12:00:00Z").unwrap();
        let shifted = ts.plus_seconds(90);
        assert_eq!(shifted.duration_since(ts).num_seconds(), 90);
        assert_eq!(shifted.minus_seconds(90), ts);
    }

    #[test]
    fn timestamp_now_is_recent() {
        let ts = Timestamp::now();
        let age = Timestamp::now().duration_since(ts);
        assert!(age.num_seconds() < 5);
    }
}
