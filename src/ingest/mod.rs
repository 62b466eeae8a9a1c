//! Event Stream Normalizer
//!
//! ## Responsibilities
//!
//! - Topic classification for the inbound MQTT surface
//! - Alias-tolerant extraction of fields from heterogeneous payloads
//! - Mapping raw frames into canonical [`AccessEvent`] / [`DeviceStatusUpdate`]
//! - The pipeline task that drains the MQTT frame channel
//!
//! One malformed message must never break the subscription loop: anything
//! unparseable is logged and dropped here, at the boundary.

mod payload;
mod pipeline;
pub mod topics;

pub use pipeline::IngestPipeline;

use std::sync::Arc;

use serde_json::Value;

use crate::reconcile::{AccessEvent, DeviceStatusUpdate, Provenance};
use crate::timefix::TimestampNormalizer;

use topics::TopicKind;

/// A normalized inbound message
#[derive(Debug, Clone)]
pub enum Inbound {
    Access(AccessEvent),
    Status(DeviceStatusUpdate),
}

/// Maps raw MQTT frames into canonical events
pub struct EventNormalizer {
    timestamps: Arc<TimestampNormalizer>,
}

impl EventNormalizer {
    pub fn new(timestamps: Arc<TimestampNormalizer>) -> Self {
        Self { timestamps }
    }

    /// Normalize one raw frame. Returns `None` for malformed payloads and
    /// unrecognized topics; never panics, never propagates a parse error.
    pub fn normalize_inbound(&self, topic: &str, payload: &[u8]) -> Option<Inbound> {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    error = %e,
                    payload_len = payload.len(),
                    "Dropping malformed payload"
                );
                return None;
            }
        };

        match topics::classify(topic) {
            TopicKind::TagScan | TopicKind::AccessLog => {
                let event = payload::access_event_from_json(
                    &value,
                    Provenance::Live,
                    &self.timestamps,
                )?;
                Some(Inbound::Access(event))
            }
            TopicKind::DeviceStatus { device_id } => {
                let update = payload::status_update_from_json(
                    device_id.as_deref(),
                    &value,
                    &self.timestamps,
                )?;
                Some(Inbound::Status(update))
            }
            TopicKind::Unknown => {
                tracing::debug!(topic = %topic, "Ignoring frame on unrecognized topic");
                None
            }
        }
    }

    /// Map one backend history record into a historical event
    pub fn historical_event(&self, record: &Value) -> Option<AccessEvent> {
        payload::access_event_from_json(record, Provenance::Historical, &self.timestamps)
    }
}
