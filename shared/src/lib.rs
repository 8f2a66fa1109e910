//! FleetGeo Shared Protocol Types
//!
//! This crate provides the wire types and codecs shared between drone
//! emulators and the FleetGeo server: newline framing, report validation and
//! the dashboard record encoding.

pub mod codec;
pub mod report;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use report::{PositionReport, RawPayload, ReportError};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Default ports and thresholds
pub mod defaults {
    /// TCP port drones stream reports to
    pub const DRONE_PORT: u16 = 8088;

    /// TCP port dashboards subscribe on
    pub const DASHBOARD_PORT: u16 = 8081;

    /// HTTP port for the non-moving drone query
    pub const HTTP_PORT: u16 = 8080;

    /// Age after which a drone counts as non-moving
    pub const NON_MOVING_AGE_MS: u64 = 10_000;
}

/// Latest accepted position of one drone.
///
/// `observed_at_ms` is stamped by the server when the report is accepted,
/// never taken from the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord<K> {
    pub id: K,
    #[serde(rename = "long")]
    pub longitude: f64,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "timestamp")]
    pub observed_at_ms: u64,
}

impl<K> PositionRecord<K> {
    /// Build a record from a validated report
    pub fn new(id: K, report: PositionReport, observed_at_ms: u64) -> Self {
        Self {
            id,
            longitude: report.longitude,
            latitude: report.latitude,
            observed_at_ms,
        }
    }

    /// The coordinate pair carried by this record
    pub fn report(&self) -> PositionReport {
        PositionReport {
            longitude: self.longitude,
            latitude: self.latitude,
        }
    }

    /// Exact coordinate comparison, no tolerance
    pub fn same_position(&self, report: &PositionReport) -> bool {
        self.longitude == report.longitude && self.latitude == report.latitude
    }

    /// Age relative to `now_ms`, saturating at zero for clock skew
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.observed_at_ms)
    }
}
