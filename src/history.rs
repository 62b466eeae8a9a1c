//! Backend history client
//!
//! Fetches the most recent access-log records from the management backend
//! so the window does not start empty. The fetch races a deadline: when the
//! backend is slow or down the system simply runs live-only, it never blocks
//! startup.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::ingest::EventNormalizer;
use crate::reconcile::{AccessEvent, EventWindow};

/// Default deadline for the initial history fetch
pub const DEFAULT_FETCH_DEADLINE_SECS: u64 = 5;

/// Client for the backend's paginated logs endpoint
pub struct HistoryClient {
    http: reqwest::Client,
    base_url: String,
    normalizer: Arc<EventNormalizer>,
}

impl HistoryClient {
    pub fn new(base_url: impl Into<String>, normalizer: Arc<EventNormalizer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            normalizer,
        }
    }

    /// Fetch the newest `per_page` records. Unparseable records are skipped
    /// individually; only transport and envelope failures are errors.
    pub async fn fetch_recent(&self, per_page: usize) -> Result<Vec<AccessEvent>> {
        let url = format!(
            "{}/api/logs?per_page={}",
            self.base_url.trim_end_matches('/'),
            per_page
        );

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::History(format!(
                "backend returned {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let records = extract_records(&body).ok_or_else(|| {
            Error::History("unrecognized logs response envelope".to_string())
        })?;

        let events: Vec<AccessEvent> = records
            .iter()
            .filter_map(|record| self.normalizer.historical_event(record))
            .collect();

        tracing::info!(
            fetched = records.len(),
            usable = events.len(),
            "History backfill fetched"
        );
        Ok(events)
    }

    /// Fold the backend history into the window, racing the deadline.
    /// Runs concurrently with live ingestion; the merge produces the same
    /// window whichever side lands first. On a missed deadline the window is
    /// left untouched and stays live-only.
    pub async fn backfill(&self, window: &EventWindow, per_page: usize, deadline: Duration) {
        match self.fetch_recent_or_timeout(per_page, deadline).await {
            Some(events) => {
                let len = window.apply(events).await;
                tracing::info!(window = len, "History backfill reconciled");
            }
            None => {
                tracing::warn!("Continuing without history backfill");
            }
        }
    }

    /// Fetch with a deadline. Timeouts and errors degrade to `None` so the
    /// caller can continue live-only.
    pub async fn fetch_recent_or_timeout(
        &self,
        per_page: usize,
        deadline: Duration,
    ) -> Option<Vec<AccessEvent>> {
        match tokio::time::timeout(deadline, self.fetch_recent(per_page)).await {
            Ok(Ok(events)) => Some(events),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "History backfill failed, running live-only");
                None
            }
            Err(_) => {
                tracing::warn!(
                    deadline_secs = deadline.as_secs(),
                    "History backfill timed out, running live-only"
                );
                None
            }
        }
    }
}

/// The backend has shipped several envelope shapes; accept all of them
fn extract_records(body: &Value) -> Option<&Vec<Value>> {
    if let Some(records) = body.as_array() {
        return Some(records);
    }
    for key in ["data", "logs", "events", "items"] {
        if let Some(records) = body.get(key).and_then(Value::as_array) {
            return Some(records);
        }
    }
    None
}
