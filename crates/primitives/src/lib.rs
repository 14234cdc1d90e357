//! Core value types shared by the anti-entropy and read-resolution crates.
//!
//! - [`Token`] and [`Range`]: positions and wrapping ranges on the ring
//! - [`Partitioner`]: maps keys onto the ring
//! - [`CfPair`]: the (table, column family) correlation key
//! - [`Row`], [`ColumnFamily`], [`Column`]: row contents with per-column timestamps

pub mod cf;
pub mod endpoint;
pub mod hash;
pub mod partitioner;
pub mod range;
pub mod row;
pub mod token;

pub use cf::CfPair;
pub use endpoint::Endpoint;
pub use hash::Hash;
pub use partitioner::{Partitioner, Sha256Partitioner};
pub use range::Range;
pub use row::{Column, ColumnFamily, Row};
pub use token::{DecoratedKey, Token};
