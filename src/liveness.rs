//! Device Liveness Inferrer
//!
//! Online/offline is derived from heartbeat recency, not from an explicit
//! connection state: a device is online iff its last heartbeat is younger
//! than the staleness threshold. Absence of a heartbeat is always offline.
//! Labels are bucketed and capped so that corrupted firmware timestamps can
//! never surface as "500000 minutes ago".

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::timefix::{RawTimestamp, TimestampNormalizer};

/// Default staleness threshold in minutes
pub const DEFAULT_OFFLINE_AFTER_MINUTES: i64 = 2;

/// Derives liveness and human-readable recency labels
pub struct LivenessInferrer {
    normalizer: Arc<TimestampNormalizer>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
}

impl LivenessInferrer {
    pub fn new(normalizer: Arc<TimestampNormalizer>, clock: Arc<dyn Clock>) -> Self {
        Self::with_threshold(
            normalizer,
            clock,
            Duration::minutes(DEFAULT_OFFLINE_AFTER_MINUTES),
        )
    }

    pub fn with_threshold(
        normalizer: Arc<TimestampNormalizer>,
        clock: Arc<dyn Clock>,
        threshold: Duration,
    ) -> Self {
        Self {
            normalizer,
            clock,
            threshold,
        }
    }

    /// Staleness threshold in use
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// A device is online iff its last heartbeat is younger than the
    /// threshold. No heartbeat means offline, never "just now".
    pub fn is_online(&self, last_seen: Option<&RawTimestamp>) -> bool {
        let Some(raw) = last_seen else {
            return false;
        };
        self.is_instant_online(self.normalizer.normalize(raw))
    }

    /// Same check for an already-normalized heartbeat instant
    pub fn is_instant_online(&self, heartbeat: DateTime<Utc>) -> bool {
        let elapsed = self.clock.now() - heartbeat;
        elapsed < self.threshold
    }

    /// Human-readable recency label for a raw heartbeat value
    pub fn last_seen_label(&self, last_seen: Option<&RawTimestamp>) -> String {
        match last_seen {
            Some(raw) => self.instant_label(self.normalizer.normalize(raw)),
            None => "never".to_string(),
        }
    }

    /// Bucketed label for a normalized instant
    pub fn instant_label(&self, at: DateTime<Utc>) -> String {
        let elapsed = self.clock.now() - at;

        // Clock skew: a future heartbeat is labeled as such, never shown as
        // "just now" or a negative count
        if elapsed < Duration::zero() {
            return "in the future".to_string();
        }

        if elapsed < Duration::minutes(1) {
            return "just now".to_string();
        }
        if elapsed < Duration::hours(1) {
            return plural(elapsed.num_minutes(), "minute");
        }
        if elapsed < Duration::hours(24) {
            return plural(elapsed.num_hours(), "hour");
        }
        if elapsed < Duration::days(7) {
            return plural(elapsed.num_days(), "day");
        }
        "more than a month ago".to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::timefix::TimestampPolicy;
    use chrono::TimeZone;

    fn setup() -> (Arc<FixedClock>, LivenessInferrer) {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::at(now));
        let normalizer = Arc::new(TimestampNormalizer::new(
            TimestampPolicy::default(),
            clock.clone(),
        ));
        let inferrer = LivenessInferrer::new(normalizer, clock.clone());
        (clock, inferrer)
    }

    fn seconds_ago(clock: &FixedClock, secs: i64) -> RawTimestamp {
        RawTimestamp::Instant(clock.now() - Duration::seconds(secs))
    }

    #[test]
    fn absent_heartbeat_is_offline() {
        let (_, inferrer) = setup();
        assert!(!inferrer.is_online(None));
        assert_eq!(inferrer.last_seen_label(None), "never");
    }

    #[test]
    fn heartbeat_inside_threshold_is_online() {
        let (clock, inferrer) = setup();
        let raw = seconds_ago(&clock, 90);
        assert!(inferrer.is_online(Some(&raw)));
        assert_eq!(inferrer.last_seen_label(Some(&raw)), "1 minute ago");
    }

    #[test]
    fn heartbeat_past_threshold_is_offline() {
        let (clock, inferrer) = setup();
        let raw = seconds_ago(&clock, 121);
        assert!(!inferrer.is_online(Some(&raw)));
    }

    #[test]
    fn labels_bucket_by_elapsed_time() {
        let (clock, inferrer) = setup();
        assert_eq!(
            inferrer.last_seen_label(Some(&seconds_ago(&clock, 20))),
            "just now"
        );
        assert_eq!(
            inferrer.last_seen_label(Some(&seconds_ago(&clock, 5 * 60))),
            "5 minutes ago"
        );
        assert_eq!(
            inferrer.last_seen_label(Some(&seconds_ago(&clock, 3 * 3600))),
            "3 hours ago"
        );
        assert_eq!(
            inferrer.last_seen_label(Some(&seconds_ago(&clock, 2 * 86_400))),
            "2 days ago"
        );
        assert_eq!(
            inferrer.last_seen_label(Some(&seconds_ago(&clock, 40 * 86_400))),
            "more than a month ago"
        );
    }

    #[test]
    fn future_heartbeat_gets_skew_label() {
        let (clock, inferrer) = setup();
        let raw = RawTimestamp::Instant(clock.now() + Duration::seconds(45));
        assert_eq!(inferrer.last_seen_label(Some(&raw)), "in the future");
    }

    #[test]
    fn epoch_second_heartbeats_work_end_to_end() {
        let (clock, inferrer) = setup();
        let ninety_ago = (clock.now() - Duration::seconds(90)).timestamp() as f64;
        let raw = RawTimestamp::Number(ninety_ago);
        assert!(inferrer.is_online(Some(&raw)));
    }
}
