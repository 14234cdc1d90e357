use std::collections::HashSet;
use std::fmt;

use strand_merkle::{difference, MerkleTree, TreeRange};
use strand_primitives::{CfPair, Endpoint, Range};
use tracing::{debug, info};

use crate::error::{RepairError, StreamError};
use crate::storage::StorageLayer;
use crate::stream::StreamPool;
use crate::topology::Topology;

/// How a comparison ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    /// The trees agree on every range both endpoints own.
    Consistent,
    /// The listed ranges were streamed to the remote endpoint.
    Repaired {
        ranges: Vec<TreeRange>,
        fraction: f64,
    },
}

/// Compares a local and a remote tree and streams the disagreeing ranges.
#[derive(Debug)]
pub struct Differencer {
    pub cf: CfPair,
    pub local: Endpoint,
    pub remote: Endpoint,
    ltree: MerkleTree,
    rtree: MerkleTree,
    differences: Vec<TreeRange>,
}

impl Differencer {
    #[must_use]
    pub const fn new(
        cf: CfPair,
        local: Endpoint,
        remote: Endpoint,
        ltree: MerkleTree,
        rtree: MerkleTree,
    ) -> Self {
        Self {
            cf,
            local,
            remote,
            ltree,
            rtree,
            differences: Vec::new(),
        }
    }

    #[must_use]
    pub fn differences(&self) -> &[TreeRange] {
        &self.differences
    }

    /// Diff the trees, keeping differences on ranges both endpoints own.
    pub fn compute(&mut self, topology: &dyn Topology) -> Result<&[TreeRange], RepairError> {
        // trees that crossed the wire arrive without one
        if self.ltree.partitioner().is_none() {
            self.ltree.set_partitioner(topology.partitioner());
        }
        if self.rtree.partitioner().is_none() {
            self.rtree.set_partitioner(topology.partitioner());
        }

        let remote: HashSet<Range> = topology
            .ranges_for_endpoint(&self.cf.table, self.remote)
            .into_iter()
            .collect();

        let interesting: Vec<Range> = topology
            .ranges_for_endpoint(&self.cf.table, self.local)
            .into_iter()
            .filter(|range| remote.contains(range))
            .collect();

        self.differences = difference(&self.ltree, &self.rtree)?
            .into_iter()
            .filter(|diff| interesting.iter().any(|range| diff.intersects(range)))
            .collect();

        Ok(&self.differences)
    }

    /// Fraction of the ring the kept differences cover.
    ///
    /// A range at depth 0 counts 1.0, at depth 1 counts 0.5, and so on.
    #[must_use]
    pub fn difference_fraction(&self) -> f64 {
        self.differences.iter().map(TreeRange::size_fraction).sum()
    }

    /// Compare the trees and repair the remote endpoint if they disagree.
    pub async fn run(
        mut self,
        topology: &dyn Topology,
        storage: &dyn StorageLayer,
        streams: &StreamPool,
    ) -> Result<Comparison, RepairError> {
        let _ignored = self.compute(topology)?;

        let fraction = self.difference_fraction();

        if self.differences.is_empty() {
            debug!(cf = %self.cf, local = %self.local, remote = %self.remote, "Endpoints are consistent");

            return Ok(Comparison::Consistent);
        }

        self.perform_streaming_repair(storage, streams).await?;

        Ok(Comparison::Repaired {
            ranges: self.differences,
            fraction,
        })
    }

    async fn perform_streaming_repair(
        &self,
        storage: &dyn StorageLayer,
        streams: &StreamPool,
    ) -> Result<(), StreamError> {
        info!(
            cf = %self.cf,
            remote = %self.remote,
            ranges = self.differences.len(),
            "Performing streaming repair"
        );

        let ranges: Vec<Range> = self.differences.iter().map(|diff| diff.range).collect();

        let artifacts = storage
            .anticompact(&self.cf, &ranges, self.remote)
            .await
            .map_err(StreamError::Anticompaction)?;

        streams
            .transfer(self.remote, self.cf.table.clone(), artifacts)
            .await?;

        info!(cf = %self.cf, remote = %self.remote, "Finished streaming repair");

        Ok(())
    }
}

impl fmt::Display for Differencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Differencer({} local={} remote={})",
            self.cf, self.local, self.remote
        )
    }
}

#[cfg(test)]
#[path = "tests/differencer.rs"]
mod tests;
