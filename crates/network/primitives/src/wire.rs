//! Versioned body encoding.
//!
//! Every body is a single format-version byte followed by the borsh encoding
//! of a closed payload enum. A receiver decodes straight into the enum it
//! expects for the verb; anything else is rejected as malformed rather than
//! guessed at.
//!
//! ```text
//! ┌─────────┬──────────────────────────────┐
//! │ version │ borsh(payload)               │
//! │  1 byte │                              │
//! └─────────┴──────────────────────────────┘
//! ```

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use crate::message::{Message, Verb};

/// Current body format version.
pub const WIRE_VERSION: u8 = 1;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WireError {
    #[error("empty message body")]
    Empty,

    #[error("unsupported wire version {found}, expected {expected}")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("expected a {expected} message, got {found}")]
    UnexpectedVerb { expected: Verb, found: Verb },

    #[error("malformed message body")]
    Malformed(#[source] std::io::Error),

    #[error("failed to encode message body")]
    Encode(#[source] std::io::Error),
}

pub fn encode<T: BorshSerialize>(payload: &T) -> Result<Vec<u8>, WireError> {
    let mut body = vec![WIRE_VERSION];
    payload.serialize(&mut body).map_err(WireError::Encode)?;
    Ok(body)
}

pub fn decode<T: BorshDeserialize>(body: &[u8]) -> Result<T, WireError> {
    let Some((&version, payload)) = body.split_first() else {
        return Err(WireError::Empty);
    };

    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion {
            found: version,
            expected: WIRE_VERSION,
        });
    }

    borsh::from_slice(payload).map_err(WireError::Malformed)
}

/// Decode the body of `message`, checking it carries the expected verb.
pub fn decode_message<T: BorshDeserialize>(message: &Message, expected: Verb) -> Result<T, WireError> {
    if message.verb != expected {
        return Err(WireError::UnexpectedVerb {
            expected,
            found: message.verb,
        });
    }

    decode(&message.body)
}
