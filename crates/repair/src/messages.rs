use borsh::{BorshDeserialize, BorshSerialize};
use strand_merkle::MerkleTree;
use strand_network_primitives::{wire, Message, Verb, WireError};
use strand_primitives::{CfPair, Endpoint};

/// Payloads exchanged between repairing nodes.
#[derive(Debug, BorshSerialize, BorshDeserialize)]
#[non_exhaustive]
pub enum RepairMessage {
    /// Validate `cf` and send back the resulting tree.
    TreeRequest { cf: CfPair },
    /// A completed tree. The partitioner is not carried.
    TreeResponse { cf: CfPair, tree: MerkleTree },
}

impl RepairMessage {
    #[must_use]
    pub const fn verb(&self) -> Verb {
        match self {
            Self::TreeRequest { .. } => Verb::TreeRequest,
            Self::TreeResponse { .. } => Verb::TreeResponse,
        }
    }

    pub fn to_message(&self, from: Endpoint) -> Result<Message, WireError> {
        Ok(Message::new(from, self.verb(), wire::encode(self)?))
    }

    /// Decode a repair message, rejecting it if its variant disagrees with the verb.
    pub fn from_message(message: &Message) -> Result<Self, WireError> {
        let payload: Self = wire::decode(&message.body)?;

        if payload.verb() != message.verb {
            return Err(WireError::UnexpectedVerb {
                expected: message.verb,
                found: payload.verb(),
            });
        }

        Ok(payload)
    }
}
