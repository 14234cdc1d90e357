//! Verb handlers for the repair protocol.

use async_trait::async_trait;
use eyre::{bail, Result as EyreResult, WrapErr};
use strand_network_primitives::{Message, Verb};
use tracing::debug;

use crate::compaction::CompactionManager;
use crate::messages::RepairMessage;
use crate::service::AntiEntropyHandle;

/// Processes one inbound message of a particular verb.
#[async_trait]
pub trait VerbHandler: Send + Sync {
    async fn handle(&self, message: Message) -> EyreResult<()>;
}

/// `TREE_REQUEST`: validate the column family; the tree goes out to every
/// neighbour once built.
#[derive(Clone, Debug)]
pub struct TreeRequestHandler {
    compaction: CompactionManager,
}

impl TreeRequestHandler {
    #[must_use]
    pub const fn new(compaction: CompactionManager) -> Self {
        Self { compaction }
    }
}

#[async_trait]
impl VerbHandler for TreeRequestHandler {
    async fn handle(&self, message: Message) -> EyreResult<()> {
        let payload = RepairMessage::from_message(&message)
            .wrap_err_with(|| format!("malformed tree request from {}", message.from))?;

        let RepairMessage::TreeRequest { cf } = payload else {
            bail!("expected a tree request from {}", message.from);
        };

        debug!(%cf, from = %message.from, "Queueing validation compaction");

        drop(self.compaction.submit_validation(cf));

        Ok(())
    }
}

/// `TREE_RESPONSE`: register the neighbour's tree at the rendezvous.
#[derive(Clone, Debug)]
pub struct TreeResponseHandler {
    service: AntiEntropyHandle,
}

impl TreeResponseHandler {
    #[must_use]
    pub const fn new(service: AntiEntropyHandle) -> Self {
        Self { service }
    }
}

#[async_trait]
impl VerbHandler for TreeResponseHandler {
    async fn handle(&self, message: Message) -> EyreResult<()> {
        let payload = RepairMessage::from_message(&message)
            .wrap_err_with(|| format!("malformed tree response from {}", message.from))?;

        let RepairMessage::TreeResponse { cf, tree } = payload else {
            bail!("expected a tree response from {}", message.from);
        };

        self.service
            .register_remote(cf, message.from, tree)
            .await
            .wrap_err("failed to register remote tree")
    }
}

/// Routes repair verbs to their handlers.
#[derive(Clone, Debug)]
pub struct RepairVerbHandler {
    tree_request: TreeRequestHandler,
    tree_response: TreeResponseHandler,
}

impl RepairVerbHandler {
    #[must_use]
    pub const fn new(tree_request: TreeRequestHandler, tree_response: TreeResponseHandler) -> Self {
        Self {
            tree_request,
            tree_response,
        }
    }
}

#[async_trait]
impl VerbHandler for RepairVerbHandler {
    async fn handle(&self, message: Message) -> EyreResult<()> {
        match message.verb {
            Verb::TreeRequest => self.tree_request.handle(message).await,
            Verb::TreeResponse => self.tree_response.handle(message).await,
            verb => bail!("{verb} is not a repair verb"),
        }
    }
}
