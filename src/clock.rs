//! Time source abstraction
//!
//! All "now"-dependent logic (timestamp repair, liveness thresholds,
//! relative-time labels, statistics buckets) goes through [`Clock`] so tests
//! can supply deterministic time instead of reading the wall clock.

use chrono::{DateTime, Utc};

/// Injectable time source
pub trait Clock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
