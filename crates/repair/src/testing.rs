//! In-memory storage and topology for tests and embedding.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
pub use strand_network_primitives::testing::{Envelope, MemoryTransport, Transfer};
use strand_network_primitives::StreamArtifact;
use strand_primitives::{CfPair, DecoratedKey, Endpoint, Partitioner, Range, Sha256Partitioner};

use crate::storage::{CompactedRow, StorageError, StorageLayer};
use crate::topology::Topology;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An anticompaction the storage was asked to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Anticompaction {
    pub cf: CfPair,
    pub ranges: Vec<Range>,
    pub peer: Endpoint,
}

/// Column families held in sorted maps.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rows: Mutex<HashMap<CfPair, BTreeMap<DecoratedKey, Vec<u8>>>>,
    anticompactions: Mutex<Vec<Anticompaction>>,
    fail_anticompaction: AtomicBool,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `key`, placing it with the default partitioner.
    pub fn insert(&self, cf: &CfPair, key: &str, data: impl Into<Vec<u8>>) {
        let key = Sha256Partitioner.decorate(key.to_owned());
        self.insert_decorated(cf, key, data);
    }

    pub fn insert_decorated(&self, cf: &CfPair, key: DecoratedKey, data: impl Into<Vec<u8>>) {
        let _previous = locked(&self.rows)
            .entry(cf.clone())
            .or_default()
            .insert(key, data.into());
    }

    #[must_use]
    pub fn anticompactions(&self) -> Vec<Anticompaction> {
        locked(&self.anticompactions).clone()
    }

    pub fn fail_anticompaction(&self, fail: bool) {
        self.fail_anticompaction.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageLayer for MemoryStorage {
    fn sample_keys(&self, cf: &CfPair) -> Result<Vec<DecoratedKey>, StorageError> {
        Ok(locked(&self.rows)
            .get(cf)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn scan<'a>(
        &'a self,
        cf: &CfPair,
    ) -> Result<Box<dyn Iterator<Item = CompactedRow> + Send + 'a>, StorageError> {
        let rows: Vec<_> = locked(&self.rows)
            .get(cf)
            .into_iter()
            .flatten()
            .map(|(key, data)| CompactedRow::new(key.clone(), Vec::new(), data.clone()))
            .collect();

        Ok(Box::new(rows.into_iter()))
    }

    async fn anticompact(
        &self,
        cf: &CfPair,
        ranges: &[Range],
        peer: Endpoint,
    ) -> Result<Vec<StreamArtifact>, StorageError> {
        if self.fail_anticompaction.load(Ordering::SeqCst) {
            return Err(StorageError::Anticompaction {
                cf: cf.clone(),
                reason: "anticompaction disabled".to_owned(),
            });
        }

        let size = locked(&self.rows).get(cf).map_or(0, |rows| {
            rows.keys()
                .filter(|key| ranges.iter().any(|range| range.contains(key.token)))
                .count()
        });

        let mut anticompactions = locked(&self.anticompactions);
        anticompactions.push(Anticompaction {
            cf: cf.clone(),
            ranges: ranges.to_vec(),
            peer,
        });

        Ok(vec![StreamArtifact {
            name: format!("{}-{}-{}", cf.table, cf.column_family, anticompactions.len()),
            ranges: ranges.to_vec(),
            size: u64::try_from(size).unwrap_or(u64::MAX),
        }])
    }
}

/// Fixed ring ownership.
#[derive(Debug)]
pub struct StaticTopology {
    local: Endpoint,
    partitioner: Arc<dyn Partitioner>,
    tables: HashMap<String, HashMap<Range, Vec<Endpoint>>>,
}

impl StaticTopology {
    #[must_use]
    pub fn new(local: Endpoint) -> Self {
        Self {
            local,
            partitioner: Arc::new(Sha256Partitioner),
            tables: HashMap::new(),
        }
    }

    /// Replicate `range` of `table` on `replicas`.
    #[must_use]
    pub fn with_range<I>(mut self, table: &str, range: Range, replicas: I) -> Self
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let _previous = self
            .tables
            .entry(table.to_owned())
            .or_default()
            .insert(range, replicas.into_iter().collect());
        self
    }

    fn ranges_of(&self, table: &str, endpoint: Endpoint) -> Vec<Range> {
        let mut ranges: Vec<_> = self
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(|(_, replicas)| replicas.contains(&endpoint))
            .map(|(range, _)| *range)
            .collect();
        ranges.sort_by_key(|range| (range.left, range.right));
        ranges
    }
}

impl Topology for StaticTopology {
    fn local_endpoint(&self) -> Endpoint {
        self.local
    }

    fn partitioner(&self) -> Arc<dyn Partitioner> {
        Arc::clone(&self.partitioner)
    }

    fn range_to_replicas(&self, table: &str) -> HashMap<Range, Vec<Endpoint>> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    fn local_ranges(&self, table: &str) -> Vec<Range> {
        self.ranges_of(table, self.local)
    }

    fn ranges_for_endpoint(&self, table: &str, endpoint: Endpoint) -> Vec<Range> {
        self.ranges_of(table, endpoint)
    }
}
