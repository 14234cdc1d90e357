//! Anti-entropy tuning with the defaults a node starts from.

use tokio::time;

use strand_merkle::{DEFAULT_MAX_SIZE, RECOMMENDED_DEPTH};

/// How long a tree waits at the rendezvous for its counterpart (48 hours)
pub const DEFAULT_RENDEZVOUS_TIMEOUT_SECS: u64 = 48 * 60 * 60;

/// Maximum number of leaves in a validation tree
pub const DEFAULT_TREE_MAX_SIZE: u64 = DEFAULT_MAX_SIZE;

/// Maximum depth of a leaf in a validation tree
pub const DEFAULT_HASH_DEPTH: u8 = RECOMMENDED_DEPTH;

/// Validations allowed to scan storage at once
pub const DEFAULT_VALIDATION_CONCURRENCY: usize = 2;

/// Outbound transfers allowed at once
pub const DEFAULT_STREAM_CONCURRENCY: usize = 4;

/// Commands buffered in front of the repair worker
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Anti-entropy configuration.
#[derive(Copy, Clone, Debug)]
pub struct AntiEntropyConfig {
    /// How long an unmatched tree is kept at the rendezvous
    pub rendezvous_timeout: time::Duration,

    /// Leaf budget of each validation tree
    pub tree_max_size: u64,

    /// Depth cap of each validation tree
    pub hash_depth: u8,

    /// Size of the validation pool
    pub validation_concurrency: usize,

    /// Size of the stream pool
    pub stream_concurrency: usize,

    /// Capacity of the repair worker's command queue
    pub channel_capacity: usize,
}

impl Default for AntiEntropyConfig {
    fn default() -> Self {
        Self {
            rendezvous_timeout: time::Duration::from_secs(DEFAULT_RENDEZVOUS_TIMEOUT_SECS),
            tree_max_size: DEFAULT_TREE_MAX_SIZE,
            hash_depth: DEFAULT_HASH_DEPTH,
            validation_concurrency: DEFAULT_VALIDATION_CONCURRENCY,
            stream_concurrency: DEFAULT_STREAM_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
