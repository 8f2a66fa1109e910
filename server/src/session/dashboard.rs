//! Dashboard subscriber session

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Broadcaster, ConnectionId};

/// Active dashboard session
///
/// Registered with the broadcaster for its whole lifetime. Dashboards send no
/// data; anything they do send is ignored.
pub struct DashboardSession<S> {
    id: ConnectionId,
    addr: SocketAddr,
    stream: S,
    broadcaster: Arc<Broadcaster>,
    queue_depth: usize,
}

impl<S> DashboardSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new dashboard session with a fresh connection id
    pub fn new(stream: S, addr: SocketAddr, broadcaster: Arc<Broadcaster>, queue_depth: usize) -> Self {
        Self {
            id: ConnectionId::new(),
            addr,
            stream,
            broadcaster,
            queue_depth: queue_depth.max(1),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Forward published lines until the dashboard goes away
    pub async fn run(self) -> Result<()> {
        let Self {
            id,
            addr,
            stream,
            broadcaster,
            queue_depth,
        } = self;

        let (sink, mut queue) = mpsc::channel(queue_depth);
        broadcaster.register(id, sink).await;
        info!(%id, %addr, "Dashboard connected");

        let result = forward(stream, &mut queue).await;

        broadcaster.unregister(id).await;
        match &result {
            Ok(()) => info!(%id, "Dashboard disconnected"),
            Err(e) => warn!(%id, "Dashboard {} dropped: {}", addr, e),
        }
        result
    }
}

async fn forward<S>(stream: S, queue: &mut mpsc::Receiver<Bytes>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut read_buf = [0u8; 512];

    loop {
        tokio::select! {
            line = queue.recv() => match line {
                Some(line) => writer.write_all(&line).await?,
                None => {
                    // Broadcaster dropped us (slow or closed)
                    debug!("Subscriber queue closed");
                    return Ok(());
                }
            },

            read = reader.read(&mut read_buf) => {
                if read? == 0 {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgeo_shared::{PositionRecord, PositionReport};
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn addr() -> SocketAddr {
        "127.0.0.1:40001".parse().unwrap()
    }

    async fn wait_for_subscribers(broadcaster: &Broadcaster, count: usize) {
        for _ in 0..100 {
            if broadcaster.subscriber_count().await == count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} subscribers");
    }

    #[tokio::test]
    async fn test_receives_published_lines() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(DashboardSession::new(server, addr(), broadcaster.clone(), 8).run());
        wait_for_subscribers(&broadcaster, 1).await;

        let record = PositionRecord::new(5u32, PositionReport::new(31.5, 23.5), 42);
        assert_eq!(broadcaster.publish(&record).await, 1);

        let mut lines = BufReader::new(client).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, r#"{"id":5,"long":31.5,"lat":23.5,"timestamp":42}"#);

        drop(lines);
        task.await.unwrap().unwrap();
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_unregisters() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(DashboardSession::new(server, addr(), broadcaster.clone(), 8).run());
        wait_for_subscribers(&broadcaster, 1).await;

        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_client_data_is_ignored() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(DashboardSession::new(server, addr(), broadcaster.clone(), 8).run());
        wait_for_subscribers(&broadcaster, 1).await;

        client.write_all(b"hello\n").await.unwrap();
        let record = PositionRecord::new(1u32, PositionReport::new(1.5, 2.5), 7);
        assert_eq!(broadcaster.publish(&record).await, 1);

        let mut lines = BufReader::new(client).lines();
        assert!(lines.next_line().await.unwrap().is_some());

        drop(lines);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ends_when_broadcaster_drops_subscriber() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (_client, server) = tokio::io::duplex(1024);
        let session = DashboardSession::new(server, addr(), broadcaster.clone(), 1);
        let id = session.id();
        let task = tokio::spawn(session.run());
        wait_for_subscribers(&broadcaster, 1).await;

        assert!(broadcaster.unregister(id).await);
        task.await.unwrap().unwrap();
    }
}
