use strand_merkle::MerkleError;
use strand_network_primitives::{TransportError, WireError};
use thiserror::Error;
use tokio::task::JoinError;

use crate::storage::StorageError;
use crate::validator::ValidatorError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RepairError {
    #[error("streaming repair failed")]
    Streaming(#[source] StreamError),

    #[error(transparent)]
    Tree(#[from] MerkleError),

    #[error(transparent)]
    Validation(#[from] ValidatorError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("background task failed")]
    Task(#[from] JoinError),

    #[error("anti-entropy service is not running")]
    ServiceStopped,
}

/// Why a streaming repair did not complete.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StreamError {
    #[error("anticompaction failed")]
    Anticompaction(#[source] StorageError),

    #[error("transfer failed")]
    Transfer(#[source] TransportError),

    #[error("stream pool is shut down")]
    PoolClosed,

    #[error("transfer task was aborted")]
    Aborted(#[source] JoinError),
}

impl From<StreamError> for RepairError {
    fn from(err: StreamError) -> Self {
        Self::Streaming(err)
    }
}
