//! Application configuration and shared state

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::history::DEFAULT_FETCH_DEADLINE_SECS;
use crate::ingest::EventNormalizer;
use crate::liveness::{LivenessInferrer, DEFAULT_OFFLINE_AFTER_MINUTES};
use crate::mqtt_link::{MqttLink, MqttLinkConfig};
use crate::reconcile::{DeviceStatusRegistry, EventWindow, DEFAULT_EVENT_CAP};
use crate::timefix::{TimestampNormalizer, TimestampPolicy};

/// Application configuration, read from the environment with defaults
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    /// Management backend base URL; history backfill is skipped when unset
    pub backend_url: Option<String>,
    pub history_per_page: usize,
    pub history_timeout_secs: u64,
    pub event_window_cap: usize,
    pub liveness_threshold_minutes: i64,
    pub ts_epoch_seconds_max: f64,
    pub ts_sane_year_min: i32,
    pub ts_sane_year_max: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8080),
            mqtt_host: env_or("MQTT_HOST", "localhost"),
            mqtt_port: env_parse_or("MQTT_PORT", 1883),
            mqtt_username: env_opt("MQTT_USERNAME"),
            mqtt_password: env_opt("MQTT_PASSWORD"),
            backend_url: env_opt("BACKEND_URL"),
            history_per_page: env_parse_or("HISTORY_PER_PAGE", 50),
            history_timeout_secs: env_parse_or("HISTORY_TIMEOUT_SECS", DEFAULT_FETCH_DEADLINE_SECS),
            event_window_cap: env_parse_or("EVENT_WINDOW_CAP", DEFAULT_EVENT_CAP),
            liveness_threshold_minutes: env_parse_or(
                "LIVENESS_THRESHOLD_MINUTES",
                DEFAULT_OFFLINE_AFTER_MINUTES,
            ),
            ts_epoch_seconds_max: env_parse_or("TS_EPOCH_SECONDS_MAX", 10_000_000_000.0),
            ts_sane_year_min: env_parse_or("TS_SANE_YEAR_MIN", 2020),
            ts_sane_year_max: env_parse_or("TS_SANE_YEAR_MAX", 2030),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn mqtt_link_config(&self) -> MqttLinkConfig {
        MqttLinkConfig {
            host: self.mqtt_host.clone(),
            port: self.mqtt_port,
            client_id: env_opt("MQTT_CLIENT_ID"),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            keep_alive_secs: env_parse_or("MQTT_KEEP_ALIVE_SECS", 60),
        }
    }

    pub fn timestamp_policy(&self) -> TimestampPolicy {
        TimestampPolicy {
            epoch_seconds_max: self.ts_epoch_seconds_max,
            sane_year_min: self.ts_sane_year_min,
            sane_year_max: self.ts_sane_year_max,
        }
    }

    pub fn history_deadline(&self) -> Duration {
        Duration::from_secs(self.history_timeout_secs)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub timestamps: Arc<TimestampNormalizer>,
    pub normalizer: Arc<EventNormalizer>,
    pub window: Arc<EventWindow>,
    pub devices: Arc<DeviceStatusRegistry>,
    pub link: Arc<MqttLink>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the component graph from configuration. The clock is injected
    /// here once and flows into everything that tells time.
    pub fn new(config: AppConfig, link: Arc<MqttLink>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timestamps = Arc::new(TimestampNormalizer::new(
            config.timestamp_policy(),
            clock.clone(),
        ));
        let liveness = Arc::new(LivenessInferrer::with_threshold(
            timestamps.clone(),
            clock.clone(),
            chrono::Duration::minutes(config.liveness_threshold_minutes),
        ));
        let normalizer = Arc::new(EventNormalizer::new(timestamps.clone()));
        let window = Arc::new(EventWindow::new(config.event_window_cap));
        let devices = Arc::new(DeviceStatusRegistry::new(liveness));

        Self {
            config,
            clock,
            timestamps,
            normalizer,
            window,
            devices,
            link,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_sec(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
