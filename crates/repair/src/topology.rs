use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use strand_primitives::{Endpoint, Partitioner, Range};

/// The node's view of ring ownership.
pub trait Topology: Send + Sync {
    fn local_endpoint(&self) -> Endpoint;

    fn partitioner(&self) -> Arc<dyn Partitioner>;

    /// Replica set of every range of `table`.
    fn range_to_replicas(&self, table: &str) -> HashMap<Range, Vec<Endpoint>>;

    /// Ranges of `table` this node stores, as primary or replica.
    fn local_ranges(&self, table: &str) -> Vec<Range>;

    fn ranges_for_endpoint(&self, table: &str, endpoint: Endpoint) -> Vec<Range>;

    /// Every other endpoint storing a copy of a locally stored range.
    fn neighbors(&self, table: &str) -> BTreeSet<Endpoint> {
        let replicas = self.range_to_replicas(table);
        let local = self.local_endpoint();

        self.local_ranges(table)
            .iter()
            .filter_map(|range| replicas.get(range))
            .flatten()
            .copied()
            .filter(|endpoint| *endpoint != local)
            .collect()
    }
}
