//! Quorum read resolution.
//!
//! Replica answers to one read accumulate in a [`ReadResponseResolver`] as
//! they arrive. Once [enough](ReadResponseResolver::is_data_present) are in,
//! [`resolve`](ReadResponseResolver::resolve) checks full answers against
//! any digests, merges them into one row and sends each stale replica only
//! the columns it was missing.

pub mod messages;
pub mod resolver;

pub use messages::{RangeSliceReply, ReadResponse, RowMutation};
pub use resolver::{
    maybe_schedule_repairs, DigestMismatch, ReadRepair, ReadRepairDispatcher, ReadResolution,
    ReadResponseResolver, ResolveError,
};
