//! Statistics over the merged event window
//!
//! Counts are always recomputed from the current snapshot. Incremental
//! accumulation double-counts when the same live batch is applied more than
//! once, so there are no running counters anywhere.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::{AccessDecision, AccessEvent};

/// Derived access statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStats {
    pub total: usize,
    pub granted: usize,
    pub denied: usize,
    pub unresolved: usize,
    /// Events on the current UTC calendar day
    pub today: usize,
    /// Events within the last hour
    pub last_hour: usize,
}

impl AccessStats {
    /// Recompute all counts from a merged snapshot
    pub fn derive(events: &[AccessEvent], now: DateTime<Utc>) -> Self {
        let mut stats = AccessStats {
            total: events.len(),
            ..Default::default()
        };

        for event in events {
            match event.decision {
                AccessDecision::Granted => stats.granted += 1,
                AccessDecision::Denied => stats.denied += 1,
                AccessDecision::Unknown => stats.unresolved += 1,
            }
            if event.at.date_naive() == now.date_naive() {
                stats.today += 1;
            }
            let elapsed = now - event.at;
            if elapsed >= Duration::zero() && elapsed <= Duration::hours(1) {
                stats.last_hour += 1;
            }
        }

        stats
    }
}
