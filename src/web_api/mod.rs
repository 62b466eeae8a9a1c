//! HTTP read surface
//!
//! Thin handlers over the reconciled state: the event window, the device
//! registry, and the MQTT link. All mutation flows through MQTT; the only
//! write endpoint publishes a device command.

mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::health_check))
        .route("/api/status", get(routes::system_status))
        .route("/api/events", get(routes::list_events))
        .route("/api/events/stats", get(routes::event_stats))
        .route("/api/devices", get(routes::list_devices))
        .route("/api/devices/:device_id", get(routes::get_device))
        .route("/api/link/status", get(routes::link_status))
        .route("/api/command", post(routes::send_command))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
