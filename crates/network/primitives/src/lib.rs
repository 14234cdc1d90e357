//! Messaging seams shared by the repair and read paths.
//!
//! The store's transport is an external collaborator; this crate only fixes
//! the envelope it carries ([`Message`]), the closed set of [`Verb`]s, the
//! versioned body encoding ([`wire`]) and the [`Transport`] trait the core
//! sends through.

pub mod message;
#[cfg(feature = "testing")]
pub mod testing;
pub mod transport;
pub mod wire;

pub use message::{Message, MessageId, Verb};
pub use transport::{StreamArtifact, Transport, TransportError};
pub use wire::WireError;
