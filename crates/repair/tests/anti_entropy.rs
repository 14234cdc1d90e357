//! End-to-end repair between in-memory nodes.
//!
//! Every node runs the full machinery (worker, validation pool, verb
//! handlers); a router task carries one-way messages between them.

use core::time::Duration;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use strand_network_primitives::{Message, Transport, Verb};
use strand_primitives::{CfPair, Endpoint, Range, Token};
use strand_repair::testing::{Envelope, MemoryStorage, MemoryTransport, StaticTopology};
use strand_repair::{AntiEntropy, AntiEntropyConfig, RepairEvent, RepairEventKind, StorageLayer};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

const WAIT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ignored = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn endpoint(port: u16) -> Endpoint {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port)).into()
}

fn cf() -> CfPair {
    CfPair::new("ks", "users")
}

struct Node {
    runtime: AntiEntropy,
    storage: Arc<MemoryStorage>,
    transport: Arc<MemoryTransport>,
    events: broadcast::Receiver<RepairEvent>,
}

impl Node {
    async fn next_event(&mut self) -> RepairEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("no repair event in time")
            .expect("event stream closed")
    }
}

/// Nodes replicating the whole ring of `ks`, wired through a router.
fn cluster(ports: &[u16]) -> Vec<Node> {
    init_tracing();

    let endpoints: Vec<_> = ports.iter().copied().map(endpoint).collect();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<Envelope>();

    let config = AntiEntropyConfig {
        tree_max_size: 16,
        ..AntiEntropyConfig::default()
    };

    let nodes: Vec<_> = endpoints
        .iter()
        .map(|&local| {
            let topology = StaticTopology::new(local).with_range(
                "ks",
                Range::full(Token::MIN),
                endpoints.iter().copied(),
            );
            let storage = Arc::new(MemoryStorage::new());
            let transport = Arc::new(MemoryTransport::connected(outbox.clone()));

            let (runtime, _worker) = AntiEntropy::start(
                config,
                Arc::new(topology),
                Arc::clone(&storage) as Arc<dyn StorageLayer>,
                Arc::clone(&transport) as Arc<dyn Transport>,
            );
            let events = runtime.service().subscribe();

            Node {
                runtime,
                storage,
                transport,
                events,
            }
        })
        .collect();

    let routes: HashMap<Endpoint, AntiEntropy> = nodes
        .iter()
        .map(|node| (node.runtime.service().local_endpoint(), node.runtime.clone()))
        .collect();

    drop(tokio::spawn(async move {
        while let Some(Envelope { to, message }) = inbox.recv().await {
            let Some(node) = routes.get(&to).cloned() else {
                continue;
            };

            drop(tokio::spawn(async move {
                if let Err(err) = node.handle_message(message).await {
                    tracing::warn!(%to, error = ?err, "Delivery failed");
                }
            }));
        }
    }));

    nodes
}

#[tokio::test]
async fn test_divergent_replicas_stream_to_each_other() {
    let mut nodes = cluster(&[7100, 7101]);

    nodes[0].storage.insert(&cf(), "alice", "1");
    nodes[0].storage.insert(&cf(), "bob", "2");
    nodes[1].storage.insert(&cf(), "alice", "1");

    nodes[0]
        .runtime
        .repair(cf())
        .await
        .unwrap()
        .await
        .unwrap()
        .unwrap();

    for (node, peer) in nodes.iter_mut().zip([7101, 7100]) {
        let event = node.next_event().await;

        assert_eq!(event.cf, cf());
        assert_eq!(event.remote, endpoint(peer));
        assert!(
            matches!(event.kind, RepairEventKind::Repaired { ref ranges, fraction }
                if !ranges.is_empty() && fraction > 0.0),
            "unexpected outcome {:?}",
            event.kind
        );

        let transfers = node.transport.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].to, endpoint(peer));
        assert_eq!(transfers[0].table, "ks");

        let anticompactions = node.storage.anticompactions();
        assert_eq!(anticompactions.len(), 1);
        assert_eq!(anticompactions[0].peer, endpoint(peer));
    }
}

#[tokio::test]
async fn test_identical_replicas_are_consistent() {
    let mut nodes = cluster(&[7110, 7111]);

    for node in &nodes {
        node.storage.insert(&cf(), "alice", "1");
        node.storage.insert(&cf(), "bob", "2");
    }

    drop(nodes[1].runtime.repair(cf()).await.unwrap());

    for node in &mut nodes {
        let event = node.next_event().await;

        assert!(matches!(event.kind, RepairEventKind::Consistent));
        assert!(node.transport.transfers().is_empty());
        assert!(node.storage.anticompactions().is_empty());
    }
}

#[tokio::test]
async fn test_failed_transfer_is_reported() {
    let mut nodes = cluster(&[7120, 7121]);

    nodes[0].storage.insert(&cf(), "alice", "1");
    nodes[0].transport.fail_transfers(true);

    drop(nodes[0].runtime.repair(cf()).await.unwrap());

    let event = nodes[0].next_event().await;
    assert!(
        matches!(event.kind, RepairEventKind::Failed { ref reason } if reason == "streaming repair failed"),
        "unexpected outcome {:?}",
        event.kind
    );

    // the neighbour's side of the exchange is unaffected
    let event = nodes[1].next_event().await;
    assert!(matches!(event.kind, RepairEventKind::Repaired { .. }));
    assert_eq!(nodes[1].transport.transfers().len(), 1);
}

#[tokio::test]
async fn test_three_replicas_pair_every_neighbour() {
    let mut nodes = cluster(&[7130, 7131, 7132]);

    nodes[0].storage.insert(&cf(), "alice", "1");
    nodes[1].storage.insert(&cf(), "alice", "1");
    nodes[2].storage.insert(&cf(), "alice", "2");

    drop(nodes[0].runtime.repair(cf()).await.unwrap());

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let event = nodes[0].next_event().await;
        outcomes.push((event.remote, matches!(event.kind, RepairEventKind::Consistent)));
    }
    outcomes.sort_by_key(|(remote, _)| remote.addr());

    assert_eq!(outcomes, [(endpoint(7131), true), (endpoint(7132), false)]);
}

#[tokio::test]
async fn test_non_repair_verbs_are_rejected() {
    let nodes = cluster(&[7140]);

    let message = Message::new(endpoint(7999), Verb::ReadResponse, Vec::new());

    assert!(nodes[0].runtime.handle_message(message).await.is_err());
}
