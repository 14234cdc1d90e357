use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use strand_primitives::Endpoint;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a message, unique within this process.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(u64);

impl MessageId {
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The verbs the replica-consistency core sends or receives.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Verb {
    /// Ask a peer to validate a column family and send back its tree.
    TreeRequest,
    /// A completed tree for a column family.
    TreeResponse,
    /// A replica's answer to a read, either full data or a digest.
    ReadResponse,
    /// A partial row mutation carrying only what the target was missing.
    ReadRepair,
    /// The rows matching a range scan.
    RangeSliceReply,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TreeRequest => "TREE_REQUEST",
            Self::TreeResponse => "TREE_RESPONSE",
            Self::ReadResponse => "READ_RESPONSE",
            Self::ReadRepair => "READ_REPAIR",
            Self::RangeSliceReply => "RANGE_SLICE_REPLY",
        };
        f.pad(name)
    }
}

/// A message as handed to and received from the transport.
///
/// `from` is filled in by the sender and trusted by receivers; the body is a
/// [`wire`](crate::wire) encoded payload whose type is fixed by `verb`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub from: Endpoint,
    pub verb: Verb,
    pub body: Vec<u8>,
}

impl Message {
    #[must_use]
    pub fn new(from: Endpoint, verb: Verb, body: Vec<u8>) -> Self {
        Self {
            id: MessageId::next(),
            from,
            verb,
            body,
        }
    }
}
