//! Periodic eviction of stale records

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use super::PositionTable;

/// Evicts records older than a fixed age on every tick
pub struct Sweeper<K>
where
    K: Eq + Hash,
{
    table: Arc<PositionTable<K>>,
    max_age_ms: u64,
    check_interval: Duration,
}

impl<K> Sweeper<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create a new sweeper
    pub fn new(table: Arc<PositionTable<K>>, max_age_ms: u64, check_interval: Duration) -> Self {
        Self {
            table,
            max_age_ms,
            check_interval,
        }
    }

    /// Run one eviction pass
    pub fn sweep(&self) -> Vec<K> {
        let evicted = self.table.evict_older_than(self.max_age_ms);
        if !evicted.is_empty() {
            info!(count = evicted.len(), ids = ?evicted, "Evicted stale drones");
        }
        evicted
    }

    /// Start the eviction loop
    pub async fn run(&self) {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sweep();
        }
    }
}
