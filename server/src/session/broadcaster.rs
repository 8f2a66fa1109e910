//! Fan-out of accepted positions to dashboard subscribers

use std::collections::HashMap;

use bytes::Bytes;
use fleetgeo_shared::{codec, PositionRecord};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::ConnectionId;

/// Outbound queue of one dashboard connection
pub type Sink = mpsc::Sender<Bytes>;

/// Manages all dashboard subscribers
///
/// Delivery is best-effort: a subscriber whose queue is full or closed is
/// dropped instead of blocking the others.
pub struct Broadcaster {
    /// Map of connection id -> outbound queue
    subscribers: RwLock<HashMap<ConnectionId, Sink>>,
}

impl Broadcaster {
    /// Create a new broadcaster with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a dashboard subscriber
    pub async fn register(&self, id: ConnectionId, sink: Sink) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, sink);
        debug!(%id, total = subscribers.len(), "Dashboard registered");
    }

    /// Unregister a dashboard subscriber, returning whether it was present
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        subscribers.remove(&id).is_some()
    }

    /// Push one record to every subscriber, returning how many accepted it
    pub async fn publish<K: Serialize>(&self, record: &PositionRecord<K>) -> usize {
        let line = match codec::encode_record(record) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode record: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dropped = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for (id, sink) in subscribers.iter() {
                match sink.try_send(line.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(%id, "Dashboard too slow, dropping subscriber");
                        dropped.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(%id, "Dashboard queue closed");
                        dropped.push(*id);
                    }
                }
            }
        }

        if !dropped.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in &dropped {
                subscribers.remove(id);
            }
        }

        delivered
    }

    /// Publish every record received on `accepted` until all senders are gone
    pub async fn run<K: Serialize>(&self, mut accepted: mpsc::Receiver<PositionRecord<K>>) {
        while let Some(record) = accepted.recv().await {
            self.publish(&record).await;
        }
        info!("Accepted-record channel closed, broadcaster stopping");
    }

    /// Get the number of registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Get the ids of all registered subscribers
    pub async fn subscribers(&self) -> Vec<ConnectionId> {
        self.subscribers.read().await.keys().copied().collect()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetgeo_shared::PositionReport;
    use std::sync::Arc;

    fn record(longitude: f64) -> PositionRecord<u32> {
        PositionRecord::new(1, PositionReport::new(longitude, 23.5), 1000)
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let broadcaster = Broadcaster::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        broadcaster.register(ConnectionId::new(), tx_a).await;
        broadcaster.register(ConnectionId::new(), tx_b).await;

        assert_eq!(broadcaster.publish(&record(31.5)).await, 2);

        let expected = Bytes::from_static(b"{\"id\":1,\"long\":31.5,\"lat\":23.5,\"timestamp\":1000}\n");
        assert_eq!(rx_a.recv().await.unwrap(), expected);
        assert_eq!(rx_b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broadcaster = Broadcaster::new();
        assert_eq!(broadcaster.publish(&record(31.5)).await, 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped() {
        let broadcaster = Broadcaster::new();
        let slow = ConnectionId::new();
        let fast = ConnectionId::new();
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        broadcaster.register(slow, slow_tx).await;
        broadcaster.register(fast, fast_tx).await;

        assert_eq!(broadcaster.publish(&record(1.5)).await, 2);
        // Slow queue is now full
        assert_eq!(broadcaster.publish(&record(2.5)).await, 1);
        assert_eq!(broadcaster.subscribers().await, vec![fast]);

        assert_eq!(broadcaster.publish(&record(3.5)).await, 1);
        let mut received = 0;
        while fast_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_dropped() {
        let broadcaster = Broadcaster::new();
        let (tx, rx) = mpsc::channel(4);
        broadcaster.register(ConnectionId::new(), tx).await;
        drop(rx);

        assert_eq!(broadcaster.publish(&record(1.5)).await, 0);
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let id = ConnectionId::new();
        let (tx, _rx) = mpsc::channel(4);
        broadcaster.register(id, tx).await;

        assert!(broadcaster.unregister(id).await);
        assert!(!broadcaster.unregister(id).await);
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_run_drains_channel_in_order() {
        let broadcaster = Arc::new(Broadcaster::new());
        let (sink, mut rx) = mpsc::channel(8);
        broadcaster.register(ConnectionId::new(), sink).await;

        let (accepted_tx, accepted_rx) = mpsc::channel(8);
        let task = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move { broadcaster.run(accepted_rx).await })
        };

        accepted_tx.send(record(1.5)).await.unwrap();
        accepted_tx.send(record(2.5)).await.unwrap();
        drop(accepted_tx);
        task.await.unwrap();

        let first: serde_json::Value = serde_json::from_slice(&rx.recv().await.unwrap()).unwrap();
        let second: serde_json::Value = serde_json::from_slice(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["long"], 1.5);
        assert_eq!(second["long"], 2.5);
    }
}
