use fleetgeo_server::{config::ServerConfig, Server};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::default();
    info!("FleetGeo server starting");
    info!("  drones:     {}", config.drone_addr());
    info!("  dashboards: {}", config.dashboard_addr());
    info!("  http:       {}", config.http_addr());

    let server = Server::bind(config).await?;
    server.run().await
}
