use std::sync::Arc;

use eyre::Result as EyreResult;
use strand_network_primitives::{Message, Transport};
use strand_primitives::CfPair;
use tokio::task::JoinHandle;
use tracing::info;

use crate::compaction::CompactionManager;
use crate::config::AntiEntropyConfig;
use crate::error::RepairError;
use crate::handlers::{RepairVerbHandler, TreeRequestHandler, TreeResponseHandler, VerbHandler};
use crate::service::{AntiEntropyHandle, AntiEntropyService};
use crate::storage::StorageLayer;
use crate::topology::Topology;

/// A node's anti-entropy machinery, wired together and running.
#[derive(Clone, Debug)]
pub struct AntiEntropy {
    service: AntiEntropyHandle,
    compaction: CompactionManager,
    handler: RepairVerbHandler,
}

impl AntiEntropy {
    /// Spawn the repair worker and build the pools and handlers around it.
    ///
    /// The worker stops once every clone of the returned value is dropped.
    #[must_use]
    pub fn start(
        config: AntiEntropyConfig,
        topology: Arc<dyn Topology>,
        storage: Arc<dyn StorageLayer>,
        transport: Arc<dyn Transport>,
    ) -> (Self, JoinHandle<()>) {
        let partitioner = topology.partitioner();

        let (service, handle) =
            AntiEntropyService::new(config, topology, Arc::clone(&storage), transport);

        let worker = tokio::spawn(service.run());

        let compaction = CompactionManager::new(&config, storage, partitioner, handle.clone());

        let handler = RepairVerbHandler::new(
            TreeRequestHandler::new(compaction.clone()),
            TreeResponseHandler::new(handle.clone()),
        );

        let this = Self {
            service: handle,
            compaction,
            handler,
        };

        (this, worker)
    }

    #[must_use]
    pub const fn service(&self) -> &AntiEntropyHandle {
        &self.service
    }

    /// Repair `cf` against every neighbour.
    ///
    /// Neighbours are asked for their trees and the local tree is validated;
    /// comparisons run as the trees meet at the rendezvous. The returned
    /// handle resolves once the local tree has been submitted.
    pub async fn repair(
        &self,
        cf: CfPair,
    ) -> Result<JoinHandle<Result<(), RepairError>>, RepairError> {
        let requested = self.service.request_trees(cf.clone()).await?;

        info!(%cf, requested, "Requested trees from neighbors");

        Ok(self.compaction.submit_validation(cf))
    }

    /// Dispatch an inbound repair message.
    pub async fn handle_message(&self, message: Message) -> EyreResult<()> {
        self.handler.handle(message).await
    }
}
