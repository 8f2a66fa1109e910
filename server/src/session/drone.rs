//! Individual drone ingest session handling

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use fleetgeo_shared::{codec::LineDecoder, PositionRecord, RawPayload};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ConnectionId, DroneTable};
use crate::store::InsertOutcome;

/// Per-connection counters, returned when the session ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub unchanged: u64,
    pub rejected: u64,
}

/// Active drone session
///
/// Frames are inserted into the table in arrival order; accepted records are
/// handed to the broadcaster over `accepted_tx`.
pub struct DroneSession<R> {
    id: ConnectionId,
    addr: SocketAddr,
    reader: R,
    decoder: LineDecoder,
    read_buf: Vec<u8>,
    table: Arc<DroneTable>,
    accepted_tx: mpsc::Sender<PositionRecord<ConnectionId>>,
    stats: IngestStats,
}

impl<R> DroneSession<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a new drone session with a fresh connection id
    pub fn new(
        reader: R,
        addr: SocketAddr,
        table: Arc<DroneTable>,
        accepted_tx: mpsc::Sender<PositionRecord<ConnectionId>>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            addr,
            reader,
            decoder: LineDecoder::new(),
            read_buf: vec![0u8; 4096],
            table,
            accepted_tx,
            stats: IngestStats::default(),
        }
    }

    /// The table key used for this connection
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Read until the peer disconnects or errors
    pub async fn run(mut self) -> IngestStats {
        info!(id = %self.id, addr = %self.addr, "Drone connected");

        loop {
            match self.reader.read(&mut self.read_buf).await {
                Ok(0) => break,
                Ok(n) => {
                    self.decoder.extend(&self.read_buf[..n]);
                    self.drain_frames().await;
                }
                Err(e) => {
                    warn!(id = %self.id, "Read error from {}: {}", self.addr, e);
                    break;
                }
            }
        }

        let discarded = self.decoder.finish();
        if discarded > 0 {
            debug!(id = %self.id, bytes = discarded, "Dropped unterminated trailing frame");
        }

        info!(
            id = %self.id,
            accepted = self.stats.accepted,
            unchanged = self.stats.unchanged,
            rejected = self.stats.rejected,
            "Drone disconnected"
        );
        self.stats
    }

    async fn drain_frames(&mut self) {
        loop {
            match self.decoder.decode_next() {
                Ok(Some(frame)) => self.handle_frame(frame).await,
                Ok(None) => break,
                Err(e) => {
                    self.stats.rejected += 1;
                    warn!(id = %self.id, "Dropping frame from {}: {}", self.addr, e);
                }
            }
        }
    }

    async fn handle_frame(&mut self, frame: Bytes) {
        match self.table.insert(self.id, &RawPayload::Text(frame.clone())) {
            Ok(InsertOutcome::Accepted(record)) => {
                self.stats.accepted += 1;
                if self.accepted_tx.send(record).await.is_err() {
                    debug!(id = %self.id, "Broadcaster gone, update not published");
                }
            }
            Ok(InsertOutcome::Unchanged(_)) => {
                self.stats.unchanged += 1;
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!(
                    id = %self.id,
                    "Rejecting report ({}): {}",
                    e,
                    String::from_utf8_lossy(&frame)
                );
            }
        }
    }
}
