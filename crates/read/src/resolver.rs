#[cfg(test)]
#[path = "tests/resolver.rs"]
mod tests;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use strand_network_primitives::{Message, MessageId, Transport, WireError};
use strand_primitives::{ColumnFamily, Endpoint, Hash, Row};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::messages::{ReadResponse, RowMutation};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("invalid response count {count}, expected 1..={replication_factor}")]
    InvalidResponseCount {
        count: usize,
        replication_factor: usize,
    },

    #[error("no full data response among the resolved responses")]
    NoData,

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A data response disagreed with a digest response.
///
/// The caller should retry the read asking every replica for full data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DigestMismatch {
    pub key: String,
    /// Digest computed from the full response
    pub actual: Hash,
    /// Digest a replica answered with
    pub expected: Hash,
}

impl fmt::Display for DigestMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mismatch for key {} ({} vs {})",
            self.key, self.actual, self.expected
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadResolution {
    /// The merged row, and the replicas sent a read repair.
    Resolved { row: Row, repaired: Vec<Endpoint> },
    Mismatch(DigestMismatch),
}

/// A mutation bound for the replica that was missing its columns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadRepair {
    pub to: Endpoint,
    pub mutation: RowMutation,
}

/// Plan read repairs for `versions` against their merged superset.
///
/// Each replica whose version lacks something in `resolved` gets a mutation
/// with just the missing columns. Replicas already holding everything get
/// nothing.
#[must_use]
pub fn maybe_schedule_repairs(
    table: &str,
    key: &str,
    resolved: &ColumnFamily,
    versions: &[(Endpoint, ColumnFamily)],
) -> Vec<ReadRepair> {
    versions
        .iter()
        .filter_map(|(endpoint, version)| {
            let missing = version.diff(resolved)?;

            Some(ReadRepair {
                to: *endpoint,
                mutation: RowMutation::new(table.to_owned(), key.to_owned(), missing),
            })
        })
        .collect()
}

/// Sends read repairs one-way, off the read path.
#[derive(Clone)]
pub struct ReadRepairDispatcher {
    local: Endpoint,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ReadRepairDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRepairDispatcher")
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

impl ReadRepairDispatcher {
    #[must_use]
    pub fn new(local: Endpoint, transport: Arc<dyn Transport>) -> Self {
        Self { local, transport }
    }

    /// Send `repairs` on a background task. Failures are logged, never
    /// reported back.
    ///
    /// Returns `None` when there is nothing to send or no runtime to send on.
    pub fn dispatch(&self, repairs: Vec<ReadRepair>) -> Option<JoinHandle<()>> {
        if repairs.is_empty() {
            return None;
        }

        let Ok(runtime) = Handle::try_current() else {
            error!(count = repairs.len(), "No runtime available, dropping read repairs");
            return None;
        };

        let local = self.local;
        let transport = Arc::clone(&self.transport);

        Some(runtime.spawn(async move {
            for ReadRepair { to, mutation } in repairs {
                let message = match mutation.to_message(local) {
                    Ok(message) => message,
                    Err(err) => {
                        error!(key = %mutation.key, %to, error = ?err, "Failed to encode read repair");
                        continue;
                    }
                };

                if let Err(err) = transport.send_one_way(to, message).await {
                    warn!(key = %mutation.key, %to, %err, "Failed to send read repair");
                }
            }
        }))
    }
}

#[derive(Debug)]
struct Received {
    from: Endpoint,
    response: ReadResponse,
}

/// Accumulates the responses to one read and reconciles them.
///
/// Responses may be preprocessed concurrently as they arrive; resolution is
/// done by a single caller.
#[derive(Debug)]
pub struct ReadResponseResolver {
    table: String,
    response_count: usize,
    results: DashMap<MessageId, Received>,
    repairs: ReadRepairDispatcher,
}

impl ReadResponseResolver {
    /// A resolver for a read that waits on `response_count` replicas out of
    /// `replication_factor`.
    pub fn new(
        table: impl Into<String>,
        response_count: usize,
        replication_factor: usize,
        repairs: ReadRepairDispatcher,
    ) -> Result<Self, ResolveError> {
        if !(1..=replication_factor).contains(&response_count) {
            return Err(ResolveError::InvalidResponseCount {
                count: response_count,
                replication_factor,
            });
        }

        Ok(Self {
            table: table.into(),
            response_count,
            results: DashMap::new(),
            repairs,
        })
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub const fn response_count(&self) -> usize {
        self.response_count
    }

    /// Decode a `READ_RESPONSE` and keep it for resolution.
    pub fn preprocess(&self, message: &Message) -> Result<(), ResolveError> {
        let response = ReadResponse::from_message(message)?;

        self.inject_preprocessed(message.id, message.from, response);

        Ok(())
    }

    /// Keep a response that never went through the wire.
    pub fn inject_preprocessed(&self, id: MessageId, from: Endpoint, response: ReadResponse) {
        let _previous = self.results.insert(id, Received { from, response });
    }

    /// Reconcile the responses among `ids`.
    ///
    /// Ids not preprocessed yet are skipped. Every full response is checked
    /// against every digest first; a disagreement is returned as
    /// [`ReadResolution::Mismatch`] and nothing is repaired. Several full
    /// responses are merged and the stale replicas repaired. A single full
    /// response is returned as is.
    pub fn resolve(&self, ids: &[MessageId]) -> Result<ReadResolution, ResolveError> {
        debug!(table = %self.table, responses = ids.len(), "Resolving read responses");

        let mut key = None;
        let mut digests = Vec::new();
        let mut versions = Vec::with_capacity(ids.len());

        for id in ids {
            let Some(received) = self.results.get(id) else {
                continue;
            };

            match &received.response {
                ReadResponse::Digest(digest) => digests.push(*digest),
                ReadResponse::Data(row) => {
                    versions.push((received.from, row.cf.clone()));
                    key = Some(row.key.clone());
                }
            }
        }

        let Some(key) = key else {
            return Err(ResolveError::NoData);
        };

        for (_, version) in &versions {
            let actual = version.digest();

            if let Some(&expected) = digests.iter().find(|&&digest| digest != actual) {
                let mismatch = DigestMismatch {
                    key,
                    actual,
                    expected,
                };
                debug!(table = %self.table, %mismatch, "Digest mismatch");

                return Ok(ReadResolution::Mismatch(mismatch));
            }
        }

        if !digests.is_empty() {
            debug!(table = %self.table, %key, "Digests verified");
        }

        let (resolved, repaired) = match versions.as_slice() {
            [] => return Err(ResolveError::NoData),
            [(_, only)] => (only.clone(), Vec::new()),
            _ => {
                let Some(resolved) = ColumnFamily::resolve_superset(versions.iter().map(|(_, cf)| cf))
                else {
                    return Err(ResolveError::NoData);
                };

                let repairs = maybe_schedule_repairs(&self.table, &key, &resolved, &versions);
                let repaired: Vec<_> = repairs.iter().map(|repair| repair.to).collect();

                debug!(table = %self.table, %key, repairs = repaired.len(), "Versions merged");

                let _task = self.repairs.dispatch(repairs);

                (resolved, repaired)
            }
        };

        Ok(ReadResolution::Resolved {
            row: Row::new(key, resolved),
            repaired,
        })
    }

    /// Whether a full response is in and, with digests, enough have arrived
    /// to resolve.
    #[must_use]
    pub fn is_data_present(&self, ids: &[MessageId]) -> bool {
        let (mut data, mut digests) = (0_usize, 0_usize);

        for id in ids {
            let Some(received) = self.results.get(id) else {
                continue;
            };

            if received.response.is_digest() {
                digests = digests.saturating_add(1);
            } else {
                data = data.saturating_add(1);
            }
        }

        data > 0 && data.saturating_add(digests) >= self.response_count
    }
}
