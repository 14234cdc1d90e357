//! The repair worker and its rendezvous table.
//!
//! Trees for a column family arrive from two directions: the local
//! validation, and `TREE_RESPONSE`s from neighbours. Whichever side arrives
//! first for a given (column family, neighbour) slot waits there; the second
//! removes it and the pair is handed to a [`Differencer`]. The table lives
//! inside [`AntiEntropyService`] and is only touched from its task, so every
//! registration is serialized and each pair is compared exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use strand_merkle::{MerkleTree, TreeRange};
use strand_network_primitives::Transport;
use strand_primitives::{CfPair, Endpoint};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::AntiEntropyConfig;
use crate::differencer::{Comparison, Differencer};
use crate::error::RepairError;
use crate::expiring::ExpiringMap;
use crate::messages::RepairMessage;
use crate::storage::StorageLayer;
use crate::stream::StreamPool;
use crate::topology::Topology;

#[cfg(test)]
#[path = "tests/service.rs"]
mod tests;

/// A tree waiting at the rendezvous for its counterpart.
#[derive(Clone, Debug)]
pub enum TreePair {
    /// The local tree arrived first.
    Local(MerkleTree),
    /// The neighbour's tree arrived first.
    Remote(MerkleTree),
}

/// Outcome of one comparison, published to subscribers.
#[derive(Clone, Debug)]
pub struct RepairEvent {
    pub cf: CfPair,
    pub remote: Endpoint,
    pub kind: RepairEventKind,
}

#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum RepairEventKind {
    Consistent,
    Repaired {
        ranges: Vec<TreeRange>,
        fraction: f64,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug)]
enum Command {
    Register {
        cf: CfPair,
        endpoint: Endpoint,
        tree: MerkleTree,
        outcome: oneshot::Sender<()>,
    },
    Validated {
        cf: CfPair,
        tree: MerkleTree,
        outcome: oneshot::Sender<()>,
    },
    RequestTrees {
        cf: CfPair,
        outcome: oneshot::Sender<usize>,
    },
    RendezvousPair {
        cf: CfPair,
        peer: Endpoint,
        outcome: oneshot::Sender<Option<TreePair>>,
    },
    PurgeExpired {
        outcome: oneshot::Sender<usize>,
    },
}

/// Cloneable client of the repair worker.
#[derive(Clone, Debug)]
pub struct AntiEntropyHandle {
    local: Endpoint,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<RepairEvent>,
}

impl AntiEntropyHandle {
    #[must_use]
    pub const fn local_endpoint(&self) -> Endpoint {
        self.local
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RepairError> {
        let (tx, rx) = oneshot::channel();

        self.commands
            .send(command(tx))
            .await
            .map_err(|_closed| RepairError::ServiceStopped)?;

        rx.await.map_err(|_dropped| RepairError::ServiceStopped)
    }

    /// Register a tree this node built, pairing it with every neighbour.
    pub async fn register_local(&self, cf: CfPair, tree: MerkleTree) -> Result<(), RepairError> {
        let endpoint = self.local;
        self.request(|outcome| Command::Register {
            cf,
            endpoint,
            tree,
            outcome,
        })
        .await
    }

    /// Register a tree received from `peer`.
    pub async fn register_remote(
        &self,
        cf: CfPair,
        peer: Endpoint,
        tree: MerkleTree,
    ) -> Result<(), RepairError> {
        self.request(|outcome| Command::Register {
            cf,
            endpoint: peer,
            tree,
            outcome,
        })
        .await
    }

    /// Submit a freshly validated local tree: register it, then send it to
    /// every neighbour.
    pub async fn validated(&self, cf: CfPair, tree: MerkleTree) -> Result<(), RepairError> {
        self.request(|outcome| Command::Validated { cf, tree, outcome })
            .await
    }

    /// Ask every neighbour to validate `cf`. Returns how many requests went out.
    pub async fn request_trees(&self, cf: CfPair) -> Result<usize, RepairError> {
        self.request(|outcome| Command::RequestTrees { cf, outcome })
            .await
    }

    /// The tree waiting for `peer` at the `cf` rendezvous, if any.
    pub async fn rendezvous_pair(
        &self,
        cf: CfPair,
        peer: Endpoint,
    ) -> Result<Option<TreePair>, RepairError> {
        self.request(|outcome| Command::RendezvousPair { cf, peer, outcome })
            .await
    }

    /// Drop expired rendezvous entries, returning how many were dropped.
    pub async fn purge_expired(&self) -> Result<usize, RepairError> {
        self.request(|outcome| Command::PurgeExpired { outcome })
            .await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RepairEvent> {
        self.events.subscribe()
    }
}

/// Owns the rendezvous table and runs every comparison.
pub struct AntiEntropyService {
    config: AntiEntropyConfig,
    topology: Arc<dyn Topology>,
    storage: Arc<dyn StorageLayer>,
    transport: Arc<dyn Transport>,
    streams: StreamPool,
    trees: HashMap<CfPair, ExpiringMap<Endpoint, TreePair>>,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<RepairEvent>,
}

impl fmt::Debug for AntiEntropyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AntiEntropyService")
            .field("config", &self.config)
            .field("local", &self.topology.local_endpoint())
            .field("column_families", &self.trees.len())
            .finish_non_exhaustive()
    }
}

impl AntiEntropyService {
    #[must_use]
    pub fn new(
        config: AntiEntropyConfig,
        topology: Arc<dyn Topology>,
        storage: Arc<dyn StorageLayer>,
        transport: Arc<dyn Transport>,
    ) -> (Self, AntiEntropyHandle) {
        let (commands_tx, commands) = mpsc::channel(config.channel_capacity.max(1));
        let (events, _) = broadcast::channel(256);

        let handle = AntiEntropyHandle {
            local: topology.local_endpoint(),
            commands: commands_tx,
            events: events.clone(),
        };

        let service = Self {
            streams: StreamPool::new(Arc::clone(&transport), config.stream_concurrency),
            config,
            topology,
            storage,
            transport,
            trees: HashMap::new(),
            commands,
            events,
        };

        (service, handle)
    }

    /// Process commands until every handle is dropped.
    pub async fn run(mut self) {
        let period = (self.config.rendezvous_timeout / 2).max(time::Duration::from_secs(1));
        let mut purge = time::interval(period);
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = purge.tick() => {
                    let purged = self.purge_expired();
                    if purged > 0 {
                        debug!(purged, "Purged expired rendezvous entries");
                    }
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };

                    self.handle_command(command).await;
                }
            }
        }

        debug!("Anti-entropy service stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Register {
                cf,
                endpoint,
                tree,
                outcome,
            } => {
                let differencers = self.rendezvous(&cf, endpoint, tree);
                self.run_differencers(differencers).await;
                let _ignored = outcome.send(());
            }
            Command::Validated { cf, tree, outcome } => {
                let response = RepairMessage::TreeResponse {
                    cf: cf.clone(),
                    tree: tree.clone(),
                };

                let local = self.topology.local_endpoint();
                let differencers = self.rendezvous(&cf, local, tree);
                self.notify_neighbors(&cf, &response).await;
                self.run_differencers(differencers).await;
                let _ignored = outcome.send(());
            }
            Command::RequestTrees { cf, outcome } => {
                let request = RepairMessage::TreeRequest { cf: cf.clone() };
                let sent = self.send_to_neighbors(&cf, &request).await;
                let _ignored = outcome.send(sent);
            }
            Command::RendezvousPair { cf, peer, outcome } => {
                let pair = self
                    .trees
                    .get(&cf)
                    .and_then(|pairs| pairs.get(&peer))
                    .cloned();
                let _ignored = outcome.send(pair);
            }
            Command::PurgeExpired { outcome } => {
                let _ignored = outcome.send(self.purge_expired());
            }
        }
    }

    fn purge_expired(&mut self) -> usize {
        let purged = self.trees.values_mut().map(ExpiringMap::purge_expired).sum();
        self.trees.retain(|_, pairs| !pairs.is_empty());
        purged
    }

    /// Register `tree` from `endpoint`, returning the comparisons it completes.
    fn rendezvous(&mut self, cf: &CfPair, endpoint: Endpoint, tree: MerkleTree) -> Vec<Differencer> {
        let local = self.topology.local_endpoint();
        let timeout = self.config.rendezvous_timeout;

        let neighbors = if endpoint == local {
            self.topology.neighbors(&cf.table)
        } else {
            Default::default()
        };

        let pairs = self
            .trees
            .entry(cf.clone())
            .or_insert_with(|| ExpiringMap::new(timeout));

        let mut differencers = Vec::new();

        if endpoint == local {
            for neighbor in neighbors {
                if let Some(TreePair::Remote(rtree)) = pairs.remove(&neighbor) {
                    differencers.push(Differencer::new(
                        cf.clone(),
                        local,
                        neighbor,
                        tree.clone(),
                        rtree,
                    ));
                    continue;
                }

                let _previous = pairs.insert(neighbor, TreePair::Local(tree.clone()));
                debug!(%cf, %neighbor, "Stored local tree to wait for neighbor");
            }
        } else if let Some(TreePair::Local(ltree)) = pairs.remove(&endpoint) {
            differencers.push(Differencer::new(cf.clone(), local, endpoint, ltree, tree));
        } else {
            let _previous = pairs.insert(endpoint, TreePair::Remote(tree));
            debug!(%cf, remote = %endpoint, "Stored remote tree to wait for local tree");
        }

        differencers
    }

    async fn run_differencers(&self, differencers: Vec<Differencer>) {
        for differencer in differencers {
            info!(%differencer, "Queueing comparison");

            let cf = differencer.cf.clone();
            let remote = differencer.remote;

            let result = differencer
                .run(
                    self.topology.as_ref(),
                    self.storage.as_ref(),
                    &self.streams,
                )
                .await;

            let kind = match result {
                Ok(Comparison::Consistent) => RepairEventKind::Consistent,
                Ok(Comparison::Repaired { ranges, fraction }) => {
                    RepairEventKind::Repaired { ranges, fraction }
                }
                Err(err) => {
                    error!(%cf, %remote, error = ?err, "Comparison failed");
                    RepairEventKind::Failed {
                        reason: err.to_string(),
                    }
                }
            };

            let _ignored = self.events.send(RepairEvent { cf, remote, kind });
        }
    }

    async fn notify_neighbors(&self, cf: &CfPair, response: &RepairMessage) {
        let sent = self.send_to_neighbors(cf, response).await;

        info!(%cf, sent, "Sent tree to neighbors");
    }

    /// Send `payload` one-way to every neighbour, logging failures.
    async fn send_to_neighbors(&self, cf: &CfPair, payload: &RepairMessage) -> usize {
        let local = self.topology.local_endpoint();

        let message = match payload.to_message(local) {
            Ok(message) => message,
            Err(err) => {
                error!(%cf, verb = %payload.verb(), error = ?err, "Failed to encode message");
                return 0;
            }
        };

        let mut sent = 0_usize;

        for neighbor in self.topology.neighbors(&cf.table) {
            match self.transport.send_one_way(neighbor, message.clone()).await {
                Ok(()) => sent = sent.saturating_add(1),
                Err(err) => {
                    warn!(%cf, %neighbor, verb = %message.verb, %err, "Failed to send to neighbor");
                }
            }
        }

        sent
    }
}
