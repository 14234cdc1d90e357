use std::fmt;
use std::sync::Arc;

use strand_merkle::MerkleTree;
use strand_primitives::{CfPair, Partitioner};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error};

use crate::config::AntiEntropyConfig;
use crate::error::RepairError;
use crate::service::AntiEntropyHandle;
use crate::storage::StorageLayer;
use crate::validator::Validator;

/// Runs validation compactions on blocking threads, a bounded number at a time.
///
/// A finished tree is submitted to the repair worker, which registers it and
/// sends it to the neighbours.
#[derive(Clone)]
pub struct CompactionManager {
    storage: Arc<dyn StorageLayer>,
    partitioner: Arc<dyn Partitioner>,
    service: AntiEntropyHandle,
    permits: Arc<Semaphore>,
    hash_depth: u8,
    tree_max_size: u64,
}

impl fmt::Debug for CompactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactionManager")
            .field("available", &self.permits.available_permits())
            .field("hash_depth", &self.hash_depth)
            .field("tree_max_size", &self.tree_max_size)
            .finish_non_exhaustive()
    }
}

impl CompactionManager {
    #[must_use]
    pub fn new(
        config: &AntiEntropyConfig,
        storage: Arc<dyn StorageLayer>,
        partitioner: Arc<dyn Partitioner>,
        service: AntiEntropyHandle,
    ) -> Self {
        Self {
            storage,
            partitioner,
            service,
            permits: Arc::new(Semaphore::new(config.validation_concurrency.max(1))),
            hash_depth: config.hash_depth,
            tree_max_size: config.tree_max_size,
        }
    }

    /// Queue a validation of `cf`.
    ///
    /// Failures are logged; the handle also yields them.
    pub fn submit_validation(&self, cf: CfPair) -> JoinHandle<Result<(), RepairError>> {
        let this = self.clone();

        tokio::spawn(async move {
            let result = this.validate(cf.clone()).await;

            if let Err(err) = &result {
                error!(%cf, error = ?err, "Validation failed");
            }

            result
        })
    }

    async fn validate(self, cf: CfPair) -> Result<(), RepairError> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_closed| RepairError::ServiceStopped)?;

        debug!(%cf, "Starting validation compaction");

        let validator = Validator::new(
            cf.clone(),
            Arc::clone(&self.partitioner),
            self.hash_depth,
            self.tree_max_size,
        );
        let storage = Arc::clone(&self.storage);

        let tree = task::spawn_blocking(move || run_validation(storage.as_ref(), validator)).await??;

        self.service.validated(cf, tree).await
    }
}

/// Scan the column family through `validator`.
fn run_validation(storage: &dyn StorageLayer, mut validator: Validator) -> Result<MerkleTree, RepairError> {
    let cf = validator.cf().clone();

    validator.prepare(&storage.sample_keys(&cf)?)?;

    for row in storage.scan(&cf)? {
        validator.add(&row)?;
    }

    Ok(validator.complete()?)
}
