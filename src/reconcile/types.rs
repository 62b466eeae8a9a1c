//! Canonical event and status types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an event entered the system. Used only to break merge ties:
/// a live copy supersedes a historical copy of the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Pushed over MQTT during this session
    Live,
    /// Fetched from the backend history endpoint
    Historical,
}

/// Access decision reported for a scan
///
/// Tri-state on purpose: a scan that has not been resolved yet is a
/// legitimate `Unknown`, not a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    Denied,
    Unknown,
}

impl AccessDecision {
    /// Map an optional explicit boolean from the wire
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => AccessDecision::Granted,
            Some(false) => AccessDecision::Denied,
            None => AccessDecision::Unknown,
        }
    }
}

/// A single access-control event (RFID scan or access-log entry)
///
/// Immutable once created; the reconciliation store only ever replaces whole
/// events during dedup, never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Unique event identity, dedup key
    pub id: String,
    /// Card/tag identifier
    pub uid: String,
    /// Reader/device that produced the event
    pub device_id: String,
    /// Normalized event instant
    pub at: DateTime<Utc>,
    /// Resolved user display name, when attribution is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Room attribution, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Tri-state access decision
    pub decision: AccessDecision,
    /// Human-readable reason/message from the device or backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Merge-precedence tag, not business state
    pub source: Provenance,
}

impl AccessEvent {
    /// Actor name for display, sentinel when no alias resolved one
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("Unknown")
    }
}

/// Derived per-device connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceConnectionStatus {
    /// No heartbeat ever seen
    Unknown,
    /// Heartbeat within the staleness threshold
    Online,
    /// Heartbeat stale or explicit disconnect reported
    Offline,
}

/// Normalized device status message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatusUpdate {
    pub device_id: String,
    /// Normalized heartbeat instant. `None` when the frame carried no
    /// heartbeat field at all; absence must never read as "seen just now".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_at: Option<DateTime<Utc>>,
    /// WiFi connectivity flag, when the payload reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi_connected: Option<bool>,
    /// MQTT connectivity flag, when the payload reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mqtt_connected: Option<bool>,
    /// Explicit online/offline claim from the payload, when present.
    /// An explicit `false` forces offline regardless of heartbeat recency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_online: Option<bool>,
}
