use std::fmt;
use std::sync::Arc;

use strand_network_primitives::{StreamArtifact, Transport};
use strand_primitives::Endpoint;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::StreamError;

/// Bounded pool running outbound transfers.
///
/// Each transfer runs on its own task once a permit is free; callers await
/// its completion.
#[derive(Clone)]
pub struct StreamPool {
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
}

impl fmt::Debug for StreamPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPool")
            .field("available", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl StreamPool {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, concurrency: usize) -> Self {
        Self {
            transport,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Transfer `artifacts` of `table` to `to`, waiting for the transfer to finish.
    pub async fn transfer(
        &self,
        to: Endpoint,
        table: String,
        artifacts: Vec<StreamArtifact>,
    ) -> Result<(), StreamError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_closed| StreamError::PoolClosed)?;

        let transport = Arc::clone(&self.transport);

        let task = tokio::spawn(async move {
            let _permit = permit;

            debug!(%to, %table, artifacts = artifacts.len(), "Starting transfer");

            transport.transfer(to, &table, artifacts).await
        });

        task.await
            .map_err(StreamError::Aborted)?
            .map_err(StreamError::Transfer)
    }
}
