//! Concurrent position table with movement-based deduplication

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fleetgeo_shared::{PositionRecord, PositionReport, RawPayload, ReportError};
use tracing::debug;

use super::clock::{Clock, SystemClock};

/// Result of inserting a valid report
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<K> {
    /// Coordinates changed (or first report): a fresh record was stored
    Accepted(PositionRecord<K>),
    /// Coordinates equal the stored record: nothing changed
    Unchanged(PositionRecord<K>),
}

impl<K> InsertOutcome<K> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, InsertOutcome::Accepted(_))
    }

    pub fn record(&self) -> &PositionRecord<K> {
        match self {
            InsertOutcome::Accepted(record) | InsertOutcome::Unchanged(record) => record,
        }
    }

    pub fn into_record(self) -> PositionRecord<K> {
        match self {
            InsertOutcome::Accepted(record) | InsertOutcome::Unchanged(record) => record,
        }
    }
}

/// Latest accepted position per id
///
/// Inserts on one id are serialized by the map's entry lock; different ids
/// land on independent shards.
pub struct PositionTable<K>
where
    K: Eq + Hash,
{
    records: DashMap<K, PositionRecord<K>>,
    clock: Arc<dyn Clock>,
}

impl<K> PositionTable<K>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Create a table stamped by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a table with an injected clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Validate `payload` and store it for `id` if the position moved
    pub fn insert(&self, id: K, payload: &RawPayload) -> Result<InsertOutcome<K>, ReportError> {
        let report = payload.validate()?;
        Ok(self.insert_report(id, report))
    }

    /// Store an already-validated report for `id` if the position moved
    pub fn insert_report(&self, id: K, report: PositionReport) -> InsertOutcome<K> {
        match self.records.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().same_position(&report) {
                    debug!(id = ?entry.key(), "No movement, ignoring update");
                    return InsertOutcome::Unchanged(entry.get().clone());
                }
                let record = PositionRecord::new(entry.key().clone(), report, self.clock.now_ms());
                entry.insert(record.clone());
                InsertOutcome::Accepted(record)
            }
            Entry::Vacant(entry) => {
                let record = PositionRecord::new(entry.key().clone(), report, self.clock.now_ms());
                entry.insert(record.clone());
                InsertOutcome::Accepted(record)
            }
        }
    }

    /// Ids whose record is strictly older than `age_ms`
    pub fn ids_older_than(&self, age_ms: u64) -> Vec<K> {
        let now = self.clock.now_ms();
        self.records
            .iter()
            .filter(|entry| entry.value().age_ms(now) > age_ms)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove every record strictly older than `age_ms`, returning the evicted ids
    pub fn evict_older_than(&self, age_ms: u64) -> Vec<K> {
        let now = self.clock.now_ms();
        let mut evicted = Vec::new();
        self.records.retain(|id, record| {
            if record.age_ms(now) > age_ms {
                evicted.push(id.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Remove all records
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Copy of the current record for `id`
    pub fn get(&self, id: &K) -> Option<PositionRecord<K>> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    /// Copies of all current records, unordered
    pub fn snapshot(&self) -> Vec<PositionRecord<K>> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current time according to this table's clock
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

impl<K> Default for PositionTable<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
