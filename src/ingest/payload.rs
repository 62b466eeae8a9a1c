//! Alias-tolerant payload extraction
//!
//! Firmware and backend versions have disagreed about key names over time.
//! Each logical field is resolved by trying its known aliases in a fixed
//! precedence order; only when every alias is absent does the field fall
//! back to its sentinel.

use serde_json::{Map, Value};

use crate::reconcile::{AccessDecision, AccessEvent, DeviceStatusUpdate, Provenance};
use crate::timefix::TimestampNormalizer;

/// Sentinel for identifiers no alias could resolve
const UNKNOWN: &str = "unknown";

const ID_ALIASES: &[&str] = &["id", "event_id", "log_id"];
const UID_ALIASES: &[&str] = &["uid", "card_uid", "rfid_uid", "tag_id"];
const DEVICE_ALIASES: &[&str] = &["device_id", "deviceId", "device", "reader_id"];
const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "time", "ts", "created_at", "scanned_at"];
const USER_ALIASES: &[&str] = &["user_name", "userName", "name", "user"];
const ROOM_ALIASES: &[&str] = &["room", "room_number", "roomNumber", "room_name"];
const GRANTED_ALIASES: &[&str] = &["access_granted", "granted", "allowed", "authorized"];
const DECISION_TEXT_ALIASES: &[&str] = &["status", "result"];
const MESSAGE_ALIASES: &[&str] = &["message", "reason", "note", "description"];
const HEARTBEAT_ALIASES: &[&str] = &["last_seen", "lastSeen", "heartbeat", "timestamp", "time"];
const WIFI_ALIASES: &[&str] = &["wifi_connected", "wifi", "wifi_ok"];
const MQTT_ALIASES: &[&str] = &["mqtt_connected", "mqtt", "mqtt_ok"];
const ONLINE_ALIASES: &[&str] = &["online", "is_online", "connected"];

/// Build a canonical access event from a JSON object of any known shape
pub fn access_event_from_json(
    value: &Value,
    source: Provenance,
    timestamps: &TimestampNormalizer,
) -> Option<AccessEvent> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            tracing::warn!(shape = %value_shape(value), "Access payload is not an object");
            return None;
        }
    };

    let at = match first_value(obj, TIMESTAMP_ALIASES) {
        Some(raw) => timestamps.normalize_value(raw),
        None => timestamps.normalize_value(&Value::Null),
    };

    let uid = first_string(obj, UID_ALIASES).unwrap_or_else(|| UNKNOWN.to_string());
    let device_id = first_string(obj, DEVICE_ALIASES).unwrap_or_else(|| UNKNOWN.to_string());

    // Synthesized identity keeps dedup working for firmware that sends no id
    let id = first_string(obj, ID_ALIASES)
        .unwrap_or_else(|| format!("{}-{}-{}", device_id, uid, at.timestamp_millis()));

    let decision = match first_bool(obj, GRANTED_ALIASES) {
        Some(flag) => AccessDecision::from_flag(Some(flag)),
        None => decision_from_text(obj),
    };

    Some(AccessEvent {
        id,
        uid,
        device_id,
        at,
        user_name: first_string(obj, USER_ALIASES),
        room: first_string(obj, ROOM_ALIASES),
        decision,
        message: first_string(obj, MESSAGE_ALIASES),
        source,
    })
}

/// Build a device status update; `topic_device_id` (from a wildcard topic)
/// takes precedence over any device field in the payload
pub fn status_update_from_json(
    topic_device_id: Option<&str>,
    value: &Value,
    timestamps: &TimestampNormalizer,
) -> Option<DeviceStatusUpdate> {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            tracing::warn!(shape = %value_shape(value), "Status payload is not an object");
            return None;
        }
    };

    let device_id = topic_device_id
        .map(str::to_string)
        .or_else(|| first_string(obj, DEVICE_ALIASES));
    let device_id = match device_id {
        Some(id) => id,
        None => {
            tracing::warn!("Status payload names no device, dropping");
            return None;
        }
    };

    // Garbage in a present heartbeat field repairs to now, but an absent
    // field stays absent; liveness must not read absence as "just now"
    let heartbeat_at = first_value(obj, HEARTBEAT_ALIASES)
        .map(|raw| timestamps.normalize_value(raw));

    Some(DeviceStatusUpdate {
        device_id,
        heartbeat_at,
        wifi_connected: first_bool(obj, WIFI_ALIASES),
        mqtt_connected: first_bool(obj, MQTT_ALIASES),
        reported_online: first_bool(obj, ONLINE_ALIASES),
    })
}

fn decision_from_text(obj: &Map<String, Value>) -> AccessDecision {
    let Some(text) = first_string(obj, DECISION_TEXT_ALIASES) else {
        return AccessDecision::Unknown;
    };
    match text.to_ascii_lowercase().as_str() {
        "granted" | "allowed" | "success" | "ok" => AccessDecision::Granted,
        "denied" | "rejected" | "blocked" => AccessDecision::Denied,
        _ => AccessDecision::Unknown,
    }
}

/// First alias present as a non-empty string; numbers are stringified so
/// numeric ids survive
fn first_string(obj: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    for key in aliases {
        match obj.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// First alias present as a boolean; accepts the 0/1 integers some firmware
/// emits
fn first_bool(obj: &Map<String, Value>, aliases: &[&str]) -> Option<bool> {
    for key in aliases {
        match obj.get(*key) {
            Some(Value::Bool(b)) => return Some(*b),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => return Some(false),
                Some(1) => return Some(true),
                _ => {}
            },
            _ => {}
        }
    }
    None
}

/// First alias present at all
fn first_value<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|key| obj.get(*key))
}

fn value_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
