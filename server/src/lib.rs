//! FleetGeo server
//!
//! Ingests newline-framed position reports from drone connections, keeps the
//! latest moved position per connection, and pushes every accepted change to
//! subscribed dashboards. Stale drones are exposed over HTTP.

pub mod config;
pub mod http;
pub mod session;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use fleetgeo_shared::PositionRecord;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use config::ServerConfig;
use session::{Broadcaster, ConnectionId, DashboardSession, DroneSession, DroneTable};
use store::Sweeper;

/// Bound listeners plus the shared table and subscriber set
pub struct Server {
    config: ServerConfig,
    drone_listener: TcpListener,
    dashboard_listener: TcpListener,
    http_listener: TcpListener,
    table: Arc<DroneTable>,
    broadcaster: Arc<Broadcaster>,
}

impl Server {
    /// Bind all listeners; fails if any address is unavailable
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        Self::bind_with_table(config, Arc::new(DroneTable::new())).await
    }

    /// Bind all listeners around an existing table
    pub async fn bind_with_table(config: ServerConfig, table: Arc<DroneTable>) -> Result<Self> {
        let drone_listener = bind(&config.drone_addr(), "drone").await?;
        let dashboard_listener = bind(&config.dashboard_addr(), "dashboard").await?;
        let http_listener = bind(&config.http_addr(), "HTTP").await?;

        Ok(Self {
            config,
            drone_listener,
            dashboard_listener,
            http_listener,
            table,
            broadcaster: Arc::new(Broadcaster::new()),
        })
    }

    pub fn drone_addr(&self) -> Result<SocketAddr> {
        Ok(self.drone_listener.local_addr()?)
    }

    pub fn dashboard_addr(&self) -> Result<SocketAddr> {
        Ok(self.dashboard_listener.local_addr()?)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        Ok(self.http_listener.local_addr()?)
    }

    pub fn table(&self) -> Arc<DroneTable> {
        self.table.clone()
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        self.broadcaster.clone()
    }

    /// Run until a listener fails
    pub async fn run(self) -> Result<()> {
        let Self {
            config,
            drone_listener,
            dashboard_listener,
            http_listener,
            table,
            broadcaster,
        } = self;

        let (accepted_tx, accepted_rx) = mpsc::channel(config.accepted_queue.max(1));
        {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move { broadcaster.run(accepted_rx).await });
        }

        if let Some(max_age_ms) = config.evict_after_ms {
            let sweeper = Sweeper::new(table.clone(), max_age_ms, config.evict_interval);
            info!(max_age_ms, "Stale drone eviction enabled");
            tokio::spawn(async move { sweeper.run().await });
        }

        let router = http::router(table.clone(), config.non_moving_age_ms);

        tokio::select! {
            result = serve_drones(drone_listener, table, accepted_tx) => result,
            result = serve_dashboards(dashboard_listener, broadcaster, config.subscriber_queue) => result,
            result = http::serve(http_listener, router) => result,
        }
    }
}

async fn bind(addr: &str, role: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {role} listener on {addr}"))
}

/// Accept drone connections, one ingest task each
pub async fn serve_drones(
    listener: TcpListener,
    table: Arc<DroneTable>,
    accepted_tx: mpsc::Sender<PositionRecord<ConnectionId>>,
) -> Result<()> {
    info!("Drone server listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Drone accept error: {}", e);
                continue;
            }
        };

        let session = DroneSession::new(socket, addr, table.clone(), accepted_tx.clone());
        tokio::spawn(session.run());
    }
}

/// Accept dashboard connections, one subscription task each
pub async fn serve_dashboards(
    listener: TcpListener,
    broadcaster: Arc<Broadcaster>,
    queue_depth: usize,
) -> Result<()> {
    info!("Dashboard server listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Dashboard accept error: {}", e);
                continue;
            }
        };

        let session = DashboardSession::new(socket, addr, broadcaster.clone(), queue_depth);
        tokio::spawn(session.run());
    }
}
