//! Shared API models

use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub mqtt_connected: bool,
    pub backend_configured: bool,
}

/// Aggregate system status
#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub mqtt: crate::mqtt_link::LinkStatus,
    pub devices_total: usize,
    pub devices_online: usize,
    pub events_in_window: usize,
}

/// Response for an accepted device command
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandAccepted {
    pub request_id: String,
}
