//! MQTT topic layout
//!
//! Inbound: tag scans, access-log entries, and device status (both the
//! shared topic and the per-device wildcard). Outbound: the command topic
//! with its response channel.

/// Live tag scans from readers
pub const TOPIC_TAG_SCAN: &str = "rfid/tags";

/// Resolved access-log entries
pub const TOPIC_ACCESS_LOG: &str = "rfid/access-log";

/// Shared device status/heartbeat topic
pub const TOPIC_DEVICE_STATUS: &str = "rfid/device-status";

/// Per-device status topic, `+` is the device id
pub const TOPIC_DEVICE_STATUS_WILDCARD: &str = "rfid/device/+/status";

/// Outbound device commands
pub const TOPIC_COMMAND: &str = "rfid/command";

/// Command responses published by devices
pub const TOPIC_COMMAND_RESPONSE: &str = "rfid/command/response";

/// All inbound subscriptions the ingest pipeline needs
pub fn subscriptions() -> [&'static str; 4] {
    [
        TOPIC_TAG_SCAN,
        TOPIC_ACCESS_LOG,
        TOPIC_DEVICE_STATUS,
        TOPIC_DEVICE_STATUS_WILDCARD,
    ]
}

/// Classified inbound topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicKind {
    TagScan,
    AccessLog,
    /// Status frame; `device_id` is present when the topic itself names the
    /// device (wildcard form)
    DeviceStatus { device_id: Option<String> },
    Unknown,
}

/// Classify a concrete topic against the inbound layout
pub fn classify(topic: &str) -> TopicKind {
    match topic {
        TOPIC_TAG_SCAN => return TopicKind::TagScan,
        TOPIC_ACCESS_LOG => return TopicKind::AccessLog,
        TOPIC_DEVICE_STATUS => return TopicKind::DeviceStatus { device_id: None },
        _ => {}
    }

    if let Some(device_id) = device_id_from_status_topic(topic) {
        return TopicKind::DeviceStatus {
            device_id: Some(device_id.to_string()),
        };
    }

    TopicKind::Unknown
}

/// Extract the device id from a `rfid/device/{id}/status` topic
pub fn device_id_from_status_topic(topic: &str) -> Option<&str> {
    let parts: Vec<&str> = topic.split('/').collect();
    match parts.as_slice() {
        ["rfid", "device", device_id, "status"] if !device_id.is_empty() => Some(device_id),
        _ => None,
    }
}
