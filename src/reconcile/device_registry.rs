//! Device Status Registry
//!
//! Tracks reader/device connectivity from heartbeat messages. Liveness is
//! derived lazily at query time from heartbeat recency, so no background
//! timer is needed; only transitions are logged to avoid spamming.
//!
//! Entries are never deleted within a session: a device that stops sending
//! heartbeats stays visible as offline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::liveness::LivenessInferrer;

use super::types::{DeviceConnectionStatus, DeviceStatusUpdate};

/// Device status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTransition {
    /// Device went from Online to Offline
    Lost,
    /// Device went from Offline (or Unknown) to Online
    Recovered,
}

/// Stored per-device state
#[derive(Debug, Clone)]
struct DeviceEntry {
    last_heartbeat: Option<DateTime<Utc>>,
    wifi_connected: Option<bool>,
    mqtt_connected: Option<bool>,
    reported_online: Option<bool>,
}

impl Default for DeviceEntry {
    fn default() -> Self {
        Self {
            last_heartbeat: None,
            wifi_connected: None,
            mqtt_connected: None,
            reported_online: None,
        }
    }
}

/// Read-only device view with derived liveness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatusSnapshot {
    pub device_id: String,
    pub status: DeviceConnectionStatus,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_seen: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_connected: Option<bool>,
}

/// Tracks device status and detects online/offline transitions
pub struct DeviceStatusRegistry {
    devices: RwLock<HashMap<String, DeviceEntry>>,
    liveness: Arc<LivenessInferrer>,
}

impl DeviceStatusRegistry {
    pub fn new(liveness: Arc<LivenessInferrer>) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            liveness,
        }
    }

    /// Apply a status update and return the transition event, if any
    pub async fn apply(&self, update: DeviceStatusUpdate) -> Option<DeviceTransition> {
        let mut devices = self.devices.write().await;
        let entry = devices.entry(update.device_id.clone()).or_default();

        let prev = self.derive_status(entry);

        if let Some(at) = update.heartbeat_at {
            entry.last_heartbeat = Some(at);
        }
        if update.wifi_connected.is_some() {
            entry.wifi_connected = update.wifi_connected;
        }
        if update.mqtt_connected.is_some() {
            entry.mqtt_connected = update.mqtt_connected;
        }
        entry.reported_online = update.reported_online;

        let next = self.derive_status(entry);

        match (prev, next) {
            (DeviceConnectionStatus::Online, DeviceConnectionStatus::Offline) => {
                tracing::warn!(device_id = %update.device_id, "Device connection lost");
                Some(DeviceTransition::Lost)
            }
            (DeviceConnectionStatus::Offline, DeviceConnectionStatus::Online)
            | (DeviceConnectionStatus::Unknown, DeviceConnectionStatus::Online) => {
                tracing::info!(device_id = %update.device_id, "Device online");
                Some(DeviceTransition::Recovered)
            }
            (DeviceConnectionStatus::Unknown, DeviceConnectionStatus::Offline) => {
                tracing::warn!(device_id = %update.device_id, "Device first seen offline");
                Some(DeviceTransition::Lost)
            }
            _ => None,
        }
    }

    /// Derived status for one device
    pub async fn status(&self, device_id: &str) -> DeviceConnectionStatus {
        let devices = self.devices.read().await;
        devices
            .get(device_id)
            .map(|entry| self.derive_status(entry))
            .unwrap_or(DeviceConnectionStatus::Unknown)
    }

    /// Snapshot for one device
    pub async fn get(&self, device_id: &str) -> Option<DeviceStatusSnapshot> {
        let devices = self.devices.read().await;
        devices
            .get(device_id)
            .map(|entry| self.snapshot_entry(device_id, entry))
    }

    /// Snapshots for every device seen this session, sorted by id
    pub async fn all(&self) -> Vec<DeviceStatusSnapshot> {
        let devices = self.devices.read().await;
        let mut snapshots: Vec<_> = devices
            .iter()
            .map(|(id, entry)| self.snapshot_entry(id, entry))
            .collect();
        snapshots.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        snapshots
    }

    /// Number of devices currently derived as online
    pub async fn online_count(&self) -> usize {
        let devices = self.devices.read().await;
        devices
            .values()
            .filter(|entry| self.derive_status(entry) == DeviceConnectionStatus::Online)
            .count()
    }

    fn derive_status(&self, entry: &DeviceEntry) -> DeviceConnectionStatus {
        // An explicit disconnect claim wins even when no heartbeat was seen
        if entry.reported_online == Some(false) {
            return DeviceConnectionStatus::Offline;
        }
        let Some(heartbeat) = entry.last_heartbeat else {
            // No heartbeat means no evidence of liveness; an explicit online
            // claim alone never derives Online
            return DeviceConnectionStatus::Unknown;
        };
        if self.liveness.is_instant_online(heartbeat) {
            DeviceConnectionStatus::Online
        } else {
            DeviceConnectionStatus::Offline
        }
    }

    fn snapshot_entry(&self, device_id: &str, entry: &DeviceEntry) -> DeviceStatusSnapshot {
        let status = self.derive_status(entry);
        let last_seen = match entry.last_heartbeat {
            Some(at) => self.liveness.instant_label(at),
            None => "never".to_string(),
        };
        DeviceStatusSnapshot {
            device_id: device_id.to_string(),
            status,
            online: status == DeviceConnectionStatus::Online,
            last_heartbeat: entry.last_heartbeat,
            last_seen,
            wifi_connected: entry.wifi_connected,
            mqtt_connected: entry.mqtt_connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::clock::Clock;
    use crate::timefix::{TimestampNormalizer, TimestampPolicy};
    use chrono::{Duration, TimeZone};

    fn setup() -> (Arc<FixedClock>, DeviceStatusRegistry) {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::at(now));
        let normalizer = Arc::new(TimestampNormalizer::new(
            TimestampPolicy::default(),
            clock.clone(),
        ));
        let liveness = Arc::new(LivenessInferrer::new(normalizer, clock.clone()));
        let registry = DeviceStatusRegistry::new(liveness);
        (clock, registry)
    }

    fn heartbeat(clock: &FixedClock, device_id: &str, secs_ago: i64) -> DeviceStatusUpdate {
        DeviceStatusUpdate {
            device_id: device_id.to_string(),
            heartbeat_at: Some(clock.now() - Duration::seconds(secs_ago)),
            wifi_connected: Some(true),
            mqtt_connected: Some(true),
            reported_online: None,
        }
    }

    #[tokio::test]
    async fn unknown_until_first_heartbeat() {
        let (_, registry) = setup();
        assert_eq!(
            registry.status("door-1").await,
            DeviceConnectionStatus::Unknown
        );
    }

    #[tokio::test]
    async fn fresh_heartbeat_goes_online() {
        let (clock, registry) = setup();
        let transition = registry.apply(heartbeat(&clock, "door-1", 10)).await;
        assert_eq!(transition, Some(DeviceTransition::Recovered));
        assert_eq!(
            registry.status("door-1").await,
            DeviceConnectionStatus::Online
        );
    }

    #[tokio::test]
    async fn stale_heartbeat_derives_offline_without_new_messages() {
        let (clock, registry) = setup();
        registry.apply(heartbeat(&clock, "door-1", 10)).await;

        // Time passes, no further messages; liveness is lazy
        clock.advance(Duration::minutes(5));
        assert_eq!(
            registry.status("door-1").await,
            DeviceConnectionStatus::Offline
        );
    }

    #[tokio::test]
    async fn explicit_disconnect_forces_offline() {
        let (clock, registry) = setup();
        registry.apply(heartbeat(&clock, "door-1", 5)).await;

        let mut update = heartbeat(&clock, "door-1", 0);
        update.reported_online = Some(false);
        let transition = registry.apply(update).await;
        assert_eq!(transition, Some(DeviceTransition::Lost));
        assert_eq!(
            registry.status("door-1").await,
            DeviceConnectionStatus::Offline
        );
    }

    #[tokio::test]
    async fn recovery_after_staleness_is_a_transition() {
        let (clock, registry) = setup();
        registry.apply(heartbeat(&clock, "door-1", 10)).await;
        clock.advance(Duration::minutes(10));

        let transition = registry.apply(heartbeat(&clock, "door-1", 0)).await;
        assert_eq!(transition, Some(DeviceTransition::Recovered));
    }

    #[tokio::test]
    async fn repeated_fresh_heartbeats_emit_no_transition() {
        let (clock, registry) = setup();
        registry.apply(heartbeat(&clock, "door-1", 10)).await;
        let transition = registry.apply(heartbeat(&clock, "door-1", 5)).await;
        assert!(transition.is_none());
    }

    #[tokio::test]
    async fn heartbeat_less_frame_never_reads_as_online() {
        let (clock, registry) = setup();
        let mut update = heartbeat(&clock, "door-1", 0);
        update.heartbeat_at = None;
        update.reported_online = Some(true);
        registry.apply(update).await;

        assert_eq!(
            registry.status("door-1").await,
            DeviceConnectionStatus::Unknown
        );
        let snapshot = registry.get("door-1").await.unwrap();
        assert!(!snapshot.online);
        assert_eq!(snapshot.last_seen, "never");
    }

    #[tokio::test]
    async fn explicit_disconnect_without_heartbeat_is_offline() {
        let (clock, registry) = setup();
        let mut update = heartbeat(&clock, "door-1", 0);
        update.heartbeat_at = None;
        update.reported_online = Some(false);
        registry.apply(update).await;

        assert_eq!(
            registry.status("door-1").await,
            DeviceConnectionStatus::Offline
        );
    }

    #[tokio::test]
    async fn stale_devices_remain_visible() {
        let (clock, registry) = setup();
        registry.apply(heartbeat(&clock, "door-1", 10)).await;
        registry.apply(heartbeat(&clock, "door-2", 10)).await;
        clock.advance(Duration::hours(2));

        let all = registry.all().await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|s| !s.online));
        assert_eq!(all[0].device_id, "door-1");
        assert_eq!(all[0].last_seen, "2 hours ago");
    }
}
