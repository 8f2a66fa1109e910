//! Session management for drone and dashboard connections
//!
//! This module handles:
//! - Per-connection identity
//! - Drone ingest: framing, validation and table insertion
//! - Fan-out of accepted positions to dashboards
//! - Dashboard subscription lifecycle

mod broadcaster;
mod dashboard;
mod drone;

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::store::PositionTable;

pub use broadcaster::{Broadcaster, Sink};
pub use dashboard::DashboardSession;
pub use drone::{DroneSession, IngestStats};

/// Random per-connection token; also the table key for drone connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position table keyed by drone connection
pub type DroneTable = PositionTable<ConnectionId>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_connection_id_serializes_as_string() {
        let id = ConnectionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
