//! An in-memory [`Transport`] that records what it is asked to do.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use strand_primitives::Endpoint;
use tokio::sync::mpsc;

use crate::message::Message;
use crate::transport::{StreamArtifact, Transport, TransportError};

/// A one-way message on its way to `to`.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub to: Endpoint,
    pub message: Message,
}

/// A completed transfer.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub to: Endpoint,
    pub table: String,
    pub artifacts: Vec<StreamArtifact>,
}

/// Records sends and transfers, optionally forwarding sends to an outbox so
/// a test can route them to other nodes.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    outbox: Option<mpsc::UnboundedSender<Envelope>>,
    sent: Mutex<Vec<Envelope>>,
    transfers: Mutex<Vec<Transfer>>,
    unreachable: Mutex<HashSet<Endpoint>>,
    fail_transfers: AtomicBool,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that also forwards every successful send to `outbox`.
    #[must_use]
    pub fn connected(outbox: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            outbox: Some(outbox),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Envelope> {
        locked(&self.sent).clone()
    }

    #[must_use]
    pub fn transfers(&self) -> Vec<Transfer> {
        locked(&self.transfers).clone()
    }

    /// Make sends to `endpoint` fail.
    pub fn set_unreachable(&self, endpoint: Endpoint) {
        let _inserted = locked(&self.unreachable).insert(endpoint);
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_one_way(&self, to: Endpoint, message: Message) -> Result<(), TransportError> {
        if locked(&self.unreachable).contains(&to) {
            return Err(TransportError::Unreachable(to));
        }

        let envelope = Envelope { to, message };
        locked(&self.sent).push(envelope.clone());

        if let Some(outbox) = &self.outbox {
            outbox.send(envelope).map_err(|_closed| TransportError::Closed)?;
        }

        Ok(())
    }

    async fn transfer(
        &self,
        to: Endpoint,
        table: &str,
        artifacts: Vec<StreamArtifact>,
    ) -> Result<(), TransportError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(TransportError::Transfer {
                to,
                reason: "transfers disabled".to_owned(),
            });
        }

        locked(&self.transfers).push(Transfer {
            to,
            table: table.to_owned(),
            artifacts,
        });

        Ok(())
    }
}
