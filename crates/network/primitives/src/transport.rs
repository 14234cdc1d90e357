use async_trait::async_trait;
use strand_primitives::{Endpoint, Range};
use thiserror::Error;

use crate::message::Message;

/// A storage file restricted to a set of ranges, ready to be streamed.
///
/// Produced by the storage layer's anticompaction and consumed by
/// [`Transport::transfer`]; the core never looks inside.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamArtifact {
    pub name: String,
    pub ranges: Vec<Range>,
    pub size: u64,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("endpoint {0} is unreachable")]
    Unreachable(Endpoint),

    #[error("transport is shut down")]
    Closed,

    #[error("transfer to {to} failed: {reason}")]
    Transfer { to: Endpoint, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outbound side of the node's transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send without waiting for, or expecting, a reply.
    async fn send_one_way(&self, to: Endpoint, message: Message) -> Result<(), TransportError>;

    /// Stream storage artifacts of `table` to `to`, resolving once the remote
    /// side has them all.
    async fn transfer(
        &self,
        to: Endpoint,
        table: &str,
        artifacts: Vec<StreamArtifact>,
    ) -> Result<(), TransportError>;
}
