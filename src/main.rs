mod connection;
mod flight;
mod transport;

use anyhow::Result;
use clap::Parser;
use connection::{DroneLink, LinkConfig, LinkEvent};
use fleetgeo_shared::{defaults, PositionReport};
use flight::{FlightParams, FlightPath};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transport::TcpConnector;

#[derive(Parser, Debug)]
#[command(name = "drone-sim", about = "Emulated drones streaming positions to a FleetGeo server")]
struct Args {
    /// Drone ingest address of the server
    #[arg(long, default_value_t = format!("127.0.0.1:{}", defaults::DRONE_PORT))]
    server: String,
    /// Number of concurrent drones
    #[arg(long, default_value_t = 5)]
    drones: usize,
    /// Reports per drone before disconnecting (0 = unlimited)
    #[arg(long, default_value_t = 20)]
    reports: u64,
    /// Delay between reports from one drone
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    /// Chance a drone repeats its last position instead of moving
    #[arg(long, default_value_t = 0.1)]
    hover: f64,
    /// Seed for reproducible flight paths
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Starting longitude of the fleet
    #[arg(long, default_value_t = 31.9724315)]
    origin_long: f64,
    /// Starting latitude of the fleet
    #[arg(long, default_value_t = 23.7573327)]
    origin_lat: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    info!("Drone emulator starting");
    info!("  server:   {}", args.server);
    info!("  drones:   {}", args.drones);
    info!("  interval: {}ms", args.interval_ms);

    let params = FlightParams {
        origin: PositionReport::new(args.origin_long, args.origin_lat),
        hover_probability: args.hover,
    };
    let period = Duration::from_millis(args.interval_ms.max(1));

    let flights = (0..args.drones).map(|n| {
        let path = FlightPath::new(params, args.seed.wrapping_add(n as u64));
        let server = args.server.clone();
        let span = tracing::info_span!("drone", n);
        tokio::spawn(fly(server, path, period, args.reports).instrument(span))
    });

    for joined in futures::future::join_all(flights).await {
        match joined {
            Ok(Ok(sent)) => debug!("Drone finished after {} reports", sent),
            Ok(Err(e)) => error!("Drone failed: {}", e),
            Err(e) => error!("Drone task panicked: {}", e),
        }
    }

    info!("All drones finished");
    Ok(())
}

/// Stream one drone's flight to the server; returns the number of reports sent
async fn fly(server: String, mut path: FlightPath, period: Duration, reports: u64) -> Result<u64> {
    let (link, events) = DroneLink::new(TcpConnector::new(server), LinkConfig::default());
    tokio::spawn(log_events(events).in_current_span());

    let start = path.position();
    info!(long = start.longitude, lat = start.latitude, "Taking off");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sent = 0u64;
    while reports == 0 || sent < reports {
        ticker.tick().await;
        let report = path.next_report();
        debug!(long = report.longitude, lat = report.latitude, "Report");
        link.send(report).await?;
        sent += 1;
    }

    link.close().await?;
    Ok(sent)
}

async fn log_events(mut events: mpsc::Receiver<LinkEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Connected => info!("Connected"),
            LinkEvent::Disconnected { reason } => warn!("Disconnected: {}", reason),
            LinkEvent::ConnectionFailed { reason } => warn!("Connection failed: {}", reason),
        }
    }
}
