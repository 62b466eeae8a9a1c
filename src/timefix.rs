//! Timestamp Normalizer
//!
//! Device firmware and older backend versions emit timestamps in several
//! shapes: epoch seconds, epoch milliseconds, ISO strings, numeric strings,
//! and occasionally garbage (Excel serial numbers, boot-time counters).
//! Everything entering the system is funneled through [`TimestampNormalizer`],
//! which produces a validated UTC instant or an explicit fallback to "now"
//! with a logged warning. It never errors and never yields a silent
//! epoch-zero instant.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::clock::Clock;

/// A timestamp of unknown shape, as received from the wire
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    /// Epoch seconds or milliseconds, units decided by magnitude
    Number(f64),
    /// Date string or numeric epoch string
    Text(String),
    /// Already-parsed instant (still subject to the sane-range gate)
    Instant(DateTime<Utc>),
}

impl RawTimestamp {
    /// Extract a raw timestamp from a JSON value, if it has a usable shape
    pub fn from_value(value: &Value) -> Option<RawTimestamp> {
        match value {
            Value::Number(n) => n.as_f64().map(RawTimestamp::Number),
            Value::String(s) => Some(RawTimestamp::Text(s.clone())),
            _ => None,
        }
    }
}

/// Bounds for timestamp repair
///
/// The epoch-unit threshold and the sane calendar range are deployment
/// assumptions, not protocol. Both are configurable; the defaults match the
/// historical behavior (10^10, years 2020-2030).
#[derive(Debug, Clone)]
pub struct TimestampPolicy {
    /// Numeric values below this magnitude are epoch seconds, above it
    /// epoch milliseconds
    pub epoch_seconds_max: f64,
    /// Earliest acceptable calendar year
    pub sane_year_min: i32,
    /// Latest acceptable calendar year
    pub sane_year_max: i32,
}

impl Default for TimestampPolicy {
    fn default() -> Self {
        Self {
            epoch_seconds_max: 1e10,
            sane_year_min: 2020,
            sane_year_max: 2030,
        }
    }
}

/// Normalizes heterogeneous timestamps into validated UTC instants
pub struct TimestampNormalizer {
    policy: TimestampPolicy,
    clock: Arc<dyn Clock>,
}

impl TimestampNormalizer {
    /// Create a normalizer with the given policy and time source
    pub fn new(policy: TimestampPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock }
    }

    /// Normalize a raw timestamp, falling back to the current time (with a
    /// warning) when the input is unparseable or outside the sane range
    pub fn normalize(&self, raw: &RawTimestamp) -> DateTime<Utc> {
        match self.try_normalize(raw) {
            Some(at) => at,
            None => {
                let now = self.clock.now();
                tracing::warn!(
                    raw = ?raw,
                    fallback = %now,
                    "Unusable timestamp, falling back to current time"
                );
                now
            }
        }
    }

    /// Normalize a JSON field that should hold a timestamp
    pub fn normalize_value(&self, value: &Value) -> DateTime<Utc> {
        match RawTimestamp::from_value(value) {
            Some(raw) => self.normalize(&raw),
            None => {
                let now = self.clock.now();
                tracing::warn!(
                    value = %value,
                    fallback = %now,
                    "Timestamp field has no usable shape, falling back to current time"
                );
                now
            }
        }
    }

    /// Normalization without the fallback, for callers that must distinguish
    /// "absent/garbage" from a real instant
    pub fn try_normalize(&self, raw: &RawTimestamp) -> Option<DateTime<Utc>> {
        match raw {
            RawTimestamp::Number(n) => self.from_number(*n),
            RawTimestamp::Text(s) => self.from_text(s),
            RawTimestamp::Instant(at) => self.in_sane_range(*at).then_some(*at),
        }
    }

    fn from_number(&self, n: f64) -> Option<DateTime<Utc>> {
        if !n.is_finite() || n <= 0.0 {
            return None;
        }
        // Below the threshold the value is epoch seconds (fractional seconds
        // allowed), above it epoch milliseconds.
        let millis = if n < self.policy.epoch_seconds_max {
            n * 1000.0
        } else {
            n
        };
        if millis > i64::MAX as f64 {
            return None;
        }
        let at = DateTime::<Utc>::from_timestamp_millis(millis as i64)?;
        self.in_sane_range(at).then_some(at)
    }

    fn from_text(&self, s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(at) = parse_date_string(s) {
            if self.in_sane_range(at) {
                return Some(at);
            }
        }

        // Strings that look numeric get a second chance as epoch values
        s.parse::<f64>().ok().and_then(|n| self.from_number(n))
    }

    fn in_sane_range(&self, at: DateTime<Utc>) -> bool {
        (self.policy.sane_year_min..=self.policy.sane_year_max).contains(&at.year())
    }
}

/// Parse the date-string shapes seen in the field: RFC 3339 first, then the
/// space/`T`-separated forms some firmware emits, then a bare date.
fn parse_date_string(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Some(at.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use chrono::TimeZone;

    fn normalizer_at(now: DateTime<Utc>) -> TimestampNormalizer {
        TimestampNormalizer::new(TimestampPolicy::default(), Arc::new(FixedClock::at(now)))
    }

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn epoch_seconds_parse_by_magnitude() {
        let n = normalizer_at(test_now());
        let at = n.normalize(&RawTimestamp::Number(1_720_129_451.0));
        assert_eq!(at.year(), 2024);
        assert_eq!(at.month(), 7);
    }

    #[test]
    fn epoch_millis_map_to_same_instant_as_seconds() {
        let n = normalizer_at(test_now());
        let secs = n.normalize(&RawTimestamp::Number(1_720_129_451.0));
        let millis = n.normalize(&RawTimestamp::Number(1_720_129_451_000.0));
        assert_eq!(secs, millis);
    }

    #[test]
    fn excel_serial_falls_back_to_now() {
        let n = normalizer_at(test_now());
        // Excel serial day count, would misread as a 1970 instant
        let at = n.normalize(&RawTimestamp::Number(45_843.072_35));
        assert_eq!(at, test_now());
    }

    #[test]
    fn negative_nan_and_zero_fall_back() {
        let n = normalizer_at(test_now());
        for bad in [-5.0, 0.0, f64::NAN, f64::INFINITY] {
            assert_eq!(n.normalize(&RawTimestamp::Number(bad)), test_now());
        }
    }

    #[test]
    fn rfc3339_in_range_round_trips() {
        let n = normalizer_at(test_now());
        let at = n.normalize(&RawTimestamp::Text("2024-07-04T21:44:11Z".into()));
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 7, 4, 21, 44, 11).unwrap());

        // Idempotent under re-normalization
        let again = n.normalize(&RawTimestamp::Instant(at));
        assert_eq!(again, at);
    }

    #[test]
    fn numeric_string_goes_through_epoch_path() {
        let n = normalizer_at(test_now());
        let at = n.normalize(&RawTimestamp::Text("1720129451".into()));
        assert_eq!(at.year(), 2024);
        assert_eq!(at.month(), 7);
    }

    #[test]
    fn invalid_and_empty_strings_fall_back() {
        let n = normalizer_at(test_now());
        assert_eq!(n.normalize(&RawTimestamp::Text("invalid-date".into())), test_now());
        assert_eq!(n.normalize(&RawTimestamp::Text("".into())), test_now());
        assert_eq!(n.normalize(&RawTimestamp::Text("   ".into())), test_now());
    }

    #[test]
    fn far_future_dates_fall_back() {
        let n = normalizer_at(test_now());
        assert_eq!(
            n.normalize(&RawTimestamp::Text("2099-01-01T00:00:00Z".into())),
            test_now()
        );
        let future = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(n.normalize(&RawTimestamp::Instant(future)), test_now());
    }

    #[test]
    fn pre_range_instants_fall_back() {
        let n = normalizer_at(test_now());
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(n.normalize(&RawTimestamp::Instant(epoch)), test_now());
    }

    #[test]
    fn json_values_are_accepted_by_shape() {
        let n = normalizer_at(test_now());
        let at = n.normalize_value(&serde_json::json!(1_720_129_451));
        assert_eq!(at.year(), 2024);
        // Arrays, objects, null: no usable shape
        assert_eq!(n.normalize_value(&serde_json::json!(null)), test_now());
        assert_eq!(n.normalize_value(&serde_json::json!([1, 2])), test_now());
    }

    #[test]
    fn custom_policy_range_is_honored() {
        let policy = TimestampPolicy {
            epoch_seconds_max: 1e10,
            sane_year_min: 1970,
            sane_year_max: 2100,
        };
        let n = TimestampNormalizer::new(policy, Arc::new(FixedClock::at(test_now())));
        let at = n.normalize(&RawTimestamp::Text("2099-01-01T00:00:00Z".into()));
        assert_eq!(at.year(), 2099);
    }
}
