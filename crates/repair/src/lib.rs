//! Anti-entropy repair between replicas of a column family.
//!
//! ## Flow
//!
//! 1. An operator calls [`AntiEntropy::repair`]: every neighbour receives a
//!    `TREE_REQUEST` and the local column family is queued for validation.
//! 2. A validation ([`CompactionManager`]) scans the column family through a
//!    [`Validator`], producing a [`MerkleTree`](strand_merkle::MerkleTree).
//! 3. The tree goes to the repair worker ([`AntiEntropyService`]), which
//!    parks it at the rendezvous and sends it to every neighbour as a
//!    `TREE_RESPONSE`.
//! 4. When a local and a remote tree for the same neighbour meet, a
//!    [`Differencer`] compares them and streams the disagreeing ranges.
//!
//! Storage, ring ownership and the transport are external; they are reached
//! through [`StorageLayer`], [`Topology`] and
//! [`Transport`](strand_network_primitives::Transport).

pub mod compaction;
pub mod config;
pub mod differencer;
pub mod error;
pub mod expiring;
pub mod handlers;
pub mod messages;
pub mod runtime;
pub mod service;
pub mod storage;
pub mod stream;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod topology;
pub mod validator;

pub use compaction::CompactionManager;
pub use config::AntiEntropyConfig;
pub use differencer::{Comparison, Differencer};
pub use error::{RepairError, StreamError};
pub use handlers::{RepairVerbHandler, TreeRequestHandler, TreeResponseHandler, VerbHandler};
pub use messages::RepairMessage;
pub use runtime::AntiEntropy;
pub use service::{AntiEntropyHandle, AntiEntropyService, RepairEvent, RepairEventKind, TreePair};
pub use storage::{CompactedRow, StorageError, StorageLayer};
pub use stream::StreamPool;
pub use topology::Topology;
pub use validator::{Validator, ValidatorError};
