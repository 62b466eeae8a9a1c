//! Event Reconciliation Store
//!
//! ## Responsibilities
//!
//! - Canonical access-event and device-status types
//! - Pure merge of live and historical event batches (dedup, order, cap)
//! - The bounded, time-ordered event window consumers read from
//! - On-demand statistics over the merged window
//! - Per-device status registry with lazily derived liveness

mod device_registry;
mod merge;
mod stats;
mod types;
mod window;

pub use device_registry::{DeviceStatusRegistry, DeviceStatusSnapshot, DeviceTransition};
pub use merge::merge;
pub use stats::AccessStats;
pub use types::{AccessDecision, AccessEvent, DeviceConnectionStatus, DeviceStatusUpdate, Provenance};
pub use window::EventWindow;

/// Default retention bound for the raw event feed
pub const DEFAULT_EVENT_CAP: usize = 50;
