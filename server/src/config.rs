//! Server configuration from the environment

use std::str::FromStr;
use std::time::Duration;

use fleetgeo_shared::defaults;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface all listeners bind to (default 0.0.0.0)
    pub bind_host: String,
    /// Drone telemetry port (default 8088)
    pub drone_port: u16,
    /// Dashboard feed port (default 8081)
    pub dashboard_port: u16,
    /// HTTP query port (default 8080)
    pub http_port: u16,
    /// Age used by the non-moving drone query (default 10 s)
    pub non_moving_age_ms: u64,
    /// Evict records older than this; disabled when unset
    pub evict_after_ms: Option<u64>,
    /// How often the sweeper runs (default 1 s)
    pub evict_interval: Duration,
    /// Per-dashboard outbound queue depth before it counts as slow (default 256)
    pub subscriber_queue: usize,
    /// Accepted-record channel depth between ingest and broadcaster (default 1024)
    pub accepted_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: std::env::var("FLEETGEO_BIND_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            drone_port: env_or("FLEETGEO_DRONE_PORT", defaults::DRONE_PORT),
            dashboard_port: env_or("FLEETGEO_DASHBOARD_PORT", defaults::DASHBOARD_PORT),
            http_port: env_or("FLEETGEO_HTTP_PORT", defaults::HTTP_PORT),
            non_moving_age_ms: env_or("FLEETGEO_NON_MOVING_AGE_MS", defaults::NON_MOVING_AGE_MS),
            evict_after_ms: env_parse("FLEETGEO_EVICT_AFTER_MS"),
            evict_interval: Duration::from_millis(env_or("FLEETGEO_EVICT_INTERVAL_MS", 1000)),
            subscriber_queue: env_or("FLEETGEO_SUBSCRIBER_QUEUE", 256),
            accepted_queue: env_or("FLEETGEO_ACCEPTED_QUEUE", 1024),
        }
    }
}

impl ServerConfig {
    pub fn drone_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.drone_port)
    }

    pub fn dashboard_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.dashboard_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.http_port)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| parse_value(&v))
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_parse(key).unwrap_or(default)
}

fn parse_value<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}
