//! Frame-channel consumer
//!
//! Drains the MQTT frame channel, normalizes each frame, and routes the
//! result into the event window or the device registry. Runs as one
//! long-lived task spawned at startup.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::error::Result;
use crate::mqtt_link::{Frame, MqttLink};
use crate::reconcile::{DeviceStatusRegistry, EventWindow};

use super::topics;
use super::{EventNormalizer, Inbound};

/// The ingest task: subscriptions and the frame loop
pub struct IngestPipeline {
    link: Arc<MqttLink>,
    normalizer: Arc<EventNormalizer>,
    window: Arc<EventWindow>,
    devices: Arc<DeviceStatusRegistry>,
}

impl IngestPipeline {
    pub fn new(
        link: Arc<MqttLink>,
        normalizer: Arc<EventNormalizer>,
        window: Arc<EventWindow>,
        devices: Arc<DeviceStatusRegistry>,
    ) -> Self {
        Self {
            link,
            normalizer,
            window,
            devices,
        }
    }

    /// Subscribe to the inbound topics and drain frames until the link
    /// shuts down
    pub async fn run(self) -> Result<()> {
        // Take the receiver before subscribing so no frame slips between
        let mut frames = self.link.frames();

        for topic in topics::subscriptions() {
            self.link.subscribe(topic).await?;
        }
        tracing::info!("Ingest pipeline running");

        loop {
            match frames.recv().await {
                Ok(frame) => self.handle(frame).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Ingest lagged behind the frame channel");
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Frame channel closed, ingest pipeline stopping");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Normalize and route one frame. Malformed frames were already logged
    /// and dropped by the normalizer.
    async fn handle(&self, frame: Frame) {
        match self.normalizer.normalize_inbound(&frame.topic, &frame.payload) {
            Some(Inbound::Access(event)) => {
                self.window.apply(vec![event]).await;
            }
            Some(Inbound::Status(update)) => {
                self.devices.apply(update).await;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::liveness::LivenessInferrer;
    use crate::reconcile::DeviceConnectionStatus;
    use crate::timefix::{TimestampNormalizer, TimestampPolicy};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        normalizer: Arc<EventNormalizer>,
        window: Arc<EventWindow>,
        devices: Arc<DeviceStatusRegistry>,
    }

    fn fixture() -> Fixture {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::at(now));
        let timestamps = Arc::new(TimestampNormalizer::new(
            TimestampPolicy::default(),
            clock.clone(),
        ));
        let liveness = Arc::new(LivenessInferrer::new(timestamps.clone(), clock));
        Fixture {
            normalizer: Arc::new(EventNormalizer::new(timestamps)),
            window: Arc::new(EventWindow::new(50)),
            devices: Arc::new(DeviceStatusRegistry::new(liveness)),
        }
    }

    // Exercises the same normalize-then-route path as handle(), without a
    // broker connection
    async fn route(f: &Fixture, topic: &str, payload: &[u8]) {
        match f.normalizer.normalize_inbound(topic, payload) {
            Some(Inbound::Access(event)) => {
                f.window.apply(vec![event]).await;
            }
            Some(Inbound::Status(update)) => {
                f.devices.apply(update).await;
            }
            None => {}
        }
    }

    #[tokio::test]
    async fn access_frames_land_in_the_window() {
        let f = fixture();
        let payload = serde_json::json!({
            "id": "evt-1", "uid": "04:A3", "device_id": "door-1",
            "timestamp": 1_749_988_700, "access_granted": true
        });
        route(&f, topics::TOPIC_TAG_SCAN, payload.to_string().as_bytes()).await;

        assert_eq!(f.window.len().await, 1);
        assert!(f.devices.all().await.is_empty());
    }

    #[tokio::test]
    async fn status_frames_land_in_the_registry() {
        let f = fixture();
        let payload = serde_json::json!({
            "device_id": "door-1", "last_seen": 1_749_988_790
        });
        route(&f, topics::TOPIC_DEVICE_STATUS, payload.to_string().as_bytes()).await;

        assert!(f.window.is_empty().await);
        assert_eq!(
            f.devices.status("door-1").await,
            DeviceConnectionStatus::Online
        );
    }

    #[tokio::test]
    async fn malformed_frames_leave_state_untouched() {
        let f = fixture();
        route(&f, topics::TOPIC_TAG_SCAN, b"{broken").await;
        route(&f, "some/other/topic", b"{}").await;

        assert!(f.window.is_empty().await);
        assert!(f.devices.all().await.is_empty());
    }
}
