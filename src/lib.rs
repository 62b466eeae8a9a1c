//! gatewatch - RFID/IoT access event reconciliation tower
//!
//! ## Architecture
//!
//! 1. **MqttLink** ([`mqtt_link`]) - owns the broker connection, fans raw
//!    frames out over a broadcast channel, publishes device commands
//! 2. **Timestamp Normalizer** ([`timefix`]) - repairs the heterogeneous
//!    timestamps firmware and backend emit into validated UTC instants
//! 3. **Liveness Inferrer** ([`liveness`]) - derives online/offline and
//!    bucketed "last seen" labels from heartbeat recency
//! 4. **Event Stream Normalizer** ([`ingest`]) - classifies topics, tolerates
//!    field aliases, maps frames into canonical events; the pipeline task
//!    drains the frame channel
//! 5. **Reconciliation Store** ([`reconcile`]) - pure merge of live and
//!    historical batches into the bounded event window, plus the device
//!    status registry and on-demand stats
//! 6. **History Client** ([`history`]) - backfills the window from the
//!    backend logs endpoint, racing a deadline
//! 7. **Web API** ([`web_api`]) - read endpoints over the reconciled state
//!    and the command publish endpoint
//!
//! Every component that tells time takes a [`clock::Clock`], injected once at
//! the composition root.

pub mod clock;
pub mod error;
pub mod history;
pub mod ingest;
pub mod liveness;
pub mod models;
pub mod mqtt_link;
pub mod reconcile;
pub mod state;
pub mod timefix;
pub mod web_api;

pub use error::{Error, Result};
pub use state::{AppConfig, AppState};
