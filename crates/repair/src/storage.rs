use async_trait::async_trait;
use strand_network_primitives::StreamArtifact;
use strand_primitives::{CfPair, DecoratedKey, Endpoint, Range};
use thiserror::Error;

/// A row as it comes out of a compaction scan.
///
/// `header` and `data` are opaque serialized bytes; they only feed the row
/// hash.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompactedRow {
    pub key: DecoratedKey,
    pub header: Vec<u8>,
    pub data: Vec<u8>,
}

impl CompactedRow {
    #[must_use]
    pub const fn new(key: DecoratedKey, header: Vec<u8>, data: Vec<u8>) -> Self {
        Self { key, header, data }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("unknown column family {0}")]
    UnknownColumnFamily(CfPair),

    #[error("anticompaction of {cf} failed: {reason}")]
    Anticompaction { cf: CfPair, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the repair core needs from the on-disk storage engine.
#[async_trait]
pub trait StorageLayer: Send + Sync {
    /// Keys sampled from the column family's index, in any order.
    fn sample_keys(&self, cf: &CfPair) -> Result<Vec<DecoratedKey>, StorageError>;

    /// Every row of the column family in ascending token order.
    ///
    /// Called from a blocking worker thread.
    fn scan<'a>(
        &'a self,
        cf: &CfPair,
    ) -> Result<Box<dyn Iterator<Item = CompactedRow> + Send + 'a>, StorageError>;

    /// Write out the data of `ranges` destined for `peer`.
    async fn anticompact(
        &self,
        cf: &CfPair,
        ranges: &[Range],
        peer: Endpoint,
    ) -> Result<Vec<StreamArtifact>, StorageError>;
}
