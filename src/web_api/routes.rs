//! Route handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{ApiResponse, CommandAccepted, HealthResponse, SystemStatus};
use crate::mqtt_link::{DeviceCommand, LinkStatus};
use crate::reconcile::{AccessEvent, AccessStats, DeviceStatusSnapshot};
use crate::state::AppState;

/// GET /healthz
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mqtt_connected = state.link.status().await == LinkStatus::Connected;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.uptime_sec(),
        mqtt_connected,
        backend_configured: state.config.backend_url.is_some(),
    })
}

/// GET /api/status - one-glance system overview
pub async fn system_status(State(state): State<AppState>) -> Json<ApiResponse<SystemStatus>> {
    let status = SystemStatus {
        mqtt: state.link.status().await,
        devices_total: state.devices.all().await.len(),
        devices_online: state.devices.online_count().await,
        events_in_window: state.window.len().await,
    };
    Json(ApiResponse::success(status))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// GET /api/events - newest first, optionally limited
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<ApiResponse<Vec<AccessEvent>>> {
    let events = state.window.snapshot(query.limit).await;
    Json(ApiResponse::success(events))
}

/// GET /api/events/stats - recomputed from the current window
pub async fn event_stats(State(state): State<AppState>) -> Json<ApiResponse<AccessStats>> {
    let stats = state.window.stats(state.clock.now()).await;
    Json(ApiResponse::success(stats))
}

/// GET /api/devices - every device seen this session
pub async fn list_devices(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<DeviceStatusSnapshot>>> {
    let devices = state.devices.all().await;
    Json(ApiResponse::success(devices))
}

/// GET /api/devices/:device_id
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<ApiResponse<DeviceStatusSnapshot>>> {
    let snapshot = state
        .devices
        .get(&device_id)
        .await
        .ok_or_else(|| Error::NotFound(format!("Device not found: {}", device_id)))?;
    Ok(Json(ApiResponse::success(snapshot)))
}

/// GET /api/link/status
pub async fn link_status(State(state): State<AppState>) -> Json<ApiResponse<LinkStatus>> {
    Json(ApiResponse::success(state.link.status().await))
}

/// POST /api/command - publish a device command, returns the request id
pub async fn send_command(
    State(state): State<AppState>,
    Json(command): Json<DeviceCommand>,
) -> Result<Json<ApiResponse<CommandAccepted>>> {
    if command.device_id.trim().is_empty() {
        return Err(Error::Validation("device_id must not be empty".to_string()));
    }
    if command.command.trim().is_empty() {
        return Err(Error::Validation("command must not be empty".to_string()));
    }

    let request_id = state.link.publish_command(command).await?;
    Ok(Json(ApiResponse::success(CommandAccepted { request_id })))
}
