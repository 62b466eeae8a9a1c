//! Bounded, time-ordered event window
//!
//! Owns the only mutable event buffer in the system. MQTT deliveries and
//! history fetch completions both land here in arbitrary order; each batch is
//! folded in by the pure merge and the buffer is replaced with a single
//! assignment under the write lock, never partially mutated. Truncation at
//! the cap is the system's backpressure: older events are dropped, not
//! queued.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::merge::merge;
use super::stats::AccessStats;
use super::types::AccessEvent;

/// The reconciled event window
pub struct EventWindow {
    buf: RwLock<Vec<AccessEvent>>,
    cap: usize,
}

impl EventWindow {
    /// Create an empty window with the given retention bound
    pub fn new(cap: usize) -> Self {
        Self {
            buf: RwLock::new(Vec::new()),
            cap,
        }
    }

    /// Retention bound
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Fold a batch of events into the window. Safe to call concurrently
    /// from the ingest loop and the backfill task.
    pub async fn apply(&self, incoming: Vec<AccessEvent>) -> usize {
        if incoming.is_empty() {
            return self.buf.read().await.len();
        }

        let mut buf = self.buf.write().await;
        let merged = merge(&buf, &incoming, self.cap);
        let len = merged.len();
        *buf = merged;

        tracing::debug!(
            incoming = incoming.len(),
            window = len,
            "Event batch reconciled"
        );
        len
    }

    /// Read-only snapshot, newest first, optionally limited
    pub async fn snapshot(&self, limit: Option<usize>) -> Vec<AccessEvent> {
        let buf = self.buf.read().await;
        match limit {
            Some(n) => buf.iter().take(n).cloned().collect(),
            None => buf.clone(),
        }
    }

    /// Statistics recomputed from the current snapshot
    pub async fn stats(&self, now: DateTime<Utc>) -> AccessStats {
        let buf = self.buf.read().await;
        AccessStats::derive(&buf, now)
    }

    /// Current window size
    pub async fn len(&self) -> usize {
        self.buf.read().await.len()
    }

    /// True when no events have been reconciled yet
    pub async fn is_empty(&self) -> bool {
        self.buf.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::types::{AccessDecision, Provenance};
    use chrono::{Duration, TimeZone};

    fn event(id: &str, offset_secs: i64, source: Provenance) -> AccessEvent {
        let base = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        AccessEvent {
            id: id.to_string(),
            uid: format!("uid-{}", id),
            device_id: "door-1".to_string(),
            at: base + Duration::seconds(offset_secs),
            user_name: None,
            room: None,
            decision: AccessDecision::Granted,
            message: None,
            source,
        }
    }

    #[tokio::test]
    async fn applies_batches_in_any_arrival_order() {
        let window = EventWindow::new(50);

        // History page lands after the live push
        window
            .apply(vec![event("live-1", 100, Provenance::Live)])
            .await;
        window
            .apply(vec![
                event("hist-1", 10, Provenance::Historical),
                event("live-1", 100, Provenance::Historical),
            ])
            .await;

        let snapshot = window.snapshot(None).await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "live-1");
        assert_eq!(snapshot[0].source, Provenance::Live);
        assert_eq!(snapshot[1].id, "hist-1");
    }

    #[tokio::test]
    async fn reapplying_the_same_batch_is_a_no_op() {
        let window = EventWindow::new(50);
        let batch = vec![
            event("a", 1, Provenance::Live),
            event("b", 2, Provenance::Live),
        ];

        window.apply(batch.clone()).await;
        let first = window.snapshot(None).await;
        window.apply(batch).await;
        let second = window.snapshot(None).await;

        assert_eq!(first.len(), second.len());
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(
            AccessStats::derive(&first, now),
            AccessStats::derive(&second, now)
        );
    }

    #[tokio::test]
    async fn window_stays_within_cap() {
        let window = EventWindow::new(50);
        let existing: Vec<_> = (0..50)
            .map(|i| event(&format!("e{}", i), i, Provenance::Historical))
            .collect();
        window.apply(existing).await;

        let fresh: Vec<_> = (0..3)
            .map(|i| event(&format!("live{}", i), 1000 + i, Provenance::Live))
            .collect();
        let len = window.apply(fresh).await;

        assert_eq!(len, 50);
        let snapshot = window.snapshot(None).await;
        assert_eq!(snapshot[0].id, "live2");
        assert!(!snapshot.iter().any(|e| e.id == "e0"));
    }

    #[tokio::test]
    async fn snapshot_limit_takes_newest() {
        let window = EventWindow::new(50);
        window
            .apply((0..10).map(|i| event(&format!("e{}", i), i, Provenance::Live)).collect())
            .await;
        let top = window.snapshot(Some(3)).await;
        assert_eq!(top.len(), 3);
        assert_eq!(top[0].id, "e9");
    }
}
