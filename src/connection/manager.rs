//! Persistent drone link with automatic reconnection

use crate::transport::{TransportConnector, TransportStream};
use anyhow::{anyhow, Result};
use fleetgeo_shared::{codec, PositionReport};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Events emitted by the link task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connected to the server
    Connected,
    /// Connection lost or closed by the server
    Disconnected { reason: String },
    /// A connect attempt failed
    ConnectionFailed { reason: String },
}

/// Configuration for a drone link
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Give up after this many consecutive failed attempts
    pub max_attempts: Option<u32>,
    /// Reports buffered while the link is down
    pub outbound_queue: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_attempts: None,
            outbound_queue: 64,
        }
    }
}

/// Streams position reports to the server, reconnecting as needed
pub struct DroneLink {
    outbound_tx: mpsc::Sender<PositionReport>,
    task: JoinHandle<()>,
}

impl DroneLink {
    /// Start the link task; events arrive on the returned receiver
    pub fn new<C>(connector: C, config: LinkConfig) -> (Self, mpsc::Receiver<LinkEvent>)
    where
        C: TransportConnector + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue.max(1));
        let (event_tx, event_rx) = mpsc::channel(32);

        let task = tokio::spawn(link_loop(connector, config, outbound_rx, event_tx));

        (Self { outbound_tx, task }, event_rx)
    }

    /// Queue a report for sending
    pub async fn send(&self, report: PositionReport) -> Result<()> {
        self.outbound_tx
            .send(report)
            .await
            .map_err(|_| anyhow!("Link closed"))
    }

    /// Flush queued reports, close the connection and wait for the task
    pub async fn close(self) -> Result<()> {
        drop(self.outbound_tx);
        self.task.await?;
        Ok(())
    }
}

/// Connect, pump, back off, repeat until the outbound side closes
async fn link_loop<C: TransportConnector>(
    connector: C,
    config: LinkConfig,
    mut outbound_rx: mpsc::Receiver<PositionReport>,
    event_tx: mpsc::Sender<LinkEvent>,
) {
    let mut reconnect_delay = config.reconnect_delay;
    let mut failures = 0u32;

    loop {
        match timeout(config.connect_timeout, connector.connect()).await {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay;
                failures = 0;
                info!("Connected to {}", connector.target());
                let _ = event_tx.send(LinkEvent::Connected).await;

                match pump(stream, &mut outbound_rx).await {
                    Ok(()) => {
                        debug!("Outbound closed, link finished");
                        return;
                    }
                    Err(reason) => {
                        warn!("Link to {} lost: {}", connector.target(), reason);
                        let _ = event_tx
                            .send(LinkEvent::Disconnected {
                                reason: reason.to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Err(e)) => {
                failures += 1;
                let _ = event_tx
                    .send(LinkEvent::ConnectionFailed {
                        reason: e.to_string(),
                    })
                    .await;
            }
            Err(_) => {
                failures += 1;
                let _ = event_tx
                    .send(LinkEvent::ConnectionFailed {
                        reason: format!("Connect timed out after {:?}", config.connect_timeout),
                    })
                    .await;
            }
        }

        if config.max_attempts.is_some_and(|max| failures >= max) {
            warn!(
                "Giving up on {} after {} failed attempts",
                connector.target(),
                failures
            );
            return;
        }

        // Wait before reconnecting
        tokio::time::sleep(reconnect_delay).await;

        // Exponential backoff
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }
}

/// Write reports until the outbound channel closes (Ok) or the server goes away (Err)
async fn pump<S: TransportStream>(
    stream: S,
    outbound_rx: &mut mpsc::Receiver<PositionReport>,
) -> Result<()> {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut discard = [0u8; 256];

    loop {
        tokio::select! {
            report = outbound_rx.recv() => {
                let Some(report) = report else { break };
                writer.write_all(&codec::encode_report(&report)).await?;
            }

            // The server never writes to drones; a read only completes on close
            read = reader.read(&mut discard) => {
                if read? == 0 {
                    return Err(anyhow!("Server closed connection"));
                }
            }
        }
    }

    writer.flush().await?;
    let mut stream = reader.unsplit(writer);
    TransportStream::shutdown(&mut stream).await
}
