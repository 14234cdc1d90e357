//! Read-path payloads.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use strand_network_primitives::{wire, Message, Verb, WireError};
use strand_primitives::{ColumnFamily, Endpoint, Hash, Row};

/// A replica's answer to a read.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum ReadResponse {
    /// Only the digest of the replica's row, for a digest query.
    Digest(Hash),
    /// The replica's full row.
    Data(Row),
}

impl ReadResponse {
    #[must_use]
    pub const fn is_digest(&self) -> bool {
        matches!(self, Self::Digest(_))
    }

    pub fn to_message(&self, from: Endpoint) -> Result<Message, WireError> {
        Ok(Message::new(from, Verb::ReadResponse, wire::encode(self)?))
    }

    pub fn from_message(message: &Message) -> Result<Self, WireError> {
        wire::decode_message(message, Verb::ReadResponse)
    }
}

/// Columns to apply to one row of a table.
///
/// Sent as a read repair, it carries only what the target was missing.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct RowMutation {
    pub table: String,
    pub key: String,
    pub cf: ColumnFamily,
}

impl RowMutation {
    #[must_use]
    pub const fn new(table: String, key: String, cf: ColumnFamily) -> Self {
        Self { table, key, cf }
    }

    pub fn to_message(&self, from: Endpoint) -> Result<Message, WireError> {
        Ok(Message::new(from, Verb::ReadRepair, wire::encode(self)?))
    }

    pub fn from_message(message: &Message) -> Result<Self, WireError> {
        wire::decode_message(message, Verb::ReadRepair)
    }
}

/// The rows matching a range scan, sent back as a single body.
#[derive(Clone, Debug, Default, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct RangeSliceReply {
    pub rows: Vec<Row>,
}

impl RangeSliceReply {
    #[must_use]
    pub const fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn to_message(&self, from: Endpoint) -> Result<Message, WireError> {
        Ok(Message::new(from, Verb::RangeSliceReply, wire::encode(self)?))
    }

    pub fn from_message(message: &Message) -> Result<Self, WireError> {
        wire::decode_message(message, Verb::RangeSliceReply)
    }
}

impl fmt::Display for RangeSliceReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RangeSliceReply{rows=")?;

        for (index, row) in self.rows.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{row}")?;
        }

        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use strand_primitives::Column;

    use super::*;

    fn endpoint() -> Endpoint {
        "127.0.0.1:7000".parse().unwrap()
    }

    fn row(key: &str, columns: &[(&str, &str)]) -> Row {
        let mut cf = ColumnFamily::new("users");
        for (name, value) in columns {
            cf.add(Column::new(*name, *value, 1));
        }
        Row::new(key.to_owned(), cf)
    }

    #[test]
    fn test_read_response_carries_verb() {
        let response = ReadResponse::Data(row("alice", &[("age", "30")]));
        let message = response.to_message(endpoint()).unwrap();

        assert_eq!(message.verb, Verb::ReadResponse);
        assert_eq!(ReadResponse::from_message(&message).unwrap(), response);
    }

    #[test]
    fn test_read_repair_is_not_a_read_response() {
        let mutation = RowMutation::new(
            "ks".to_owned(),
            "alice".to_owned(),
            ColumnFamily::new("users"),
        );
        let message = mutation.to_message(endpoint()).unwrap();

        assert!(matches!(
            ReadResponse::from_message(&message),
            Err(WireError::UnexpectedVerb {
                expected: Verb::ReadResponse,
                found: Verb::ReadRepair,
            })
        ));
        assert_eq!(RowMutation::from_message(&message).unwrap(), mutation);
    }

    #[test]
    fn test_range_slice_reply_keeps_row_order() {
        let reply = RangeSliceReply::new(vec![
            row("bob", &[("age", "41")]),
            row("alice", &[]),
            row("carol", &[("age", "29"), ("city", "Oslo")]),
        ]);

        let message = reply.to_message(endpoint()).unwrap();
        let decoded = RangeSliceReply::from_message(&message).unwrap();

        let keys: Vec<_> = decoded.rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(keys, ["bob", "alice", "carol"]);
    }

    #[test]
    fn test_range_slice_reply_display() {
        let reply = RangeSliceReply::new(vec![row("a", &[("x", "1")]), row("b", &[])]);

        assert_eq!(
            reply.to_string(),
            "RangeSliceReply{rows=Row(a, 1 columns),Row(b, 0 columns)}"
        );
        assert_eq!(RangeSliceReply::default().to_string(), "RangeSliceReply{rows=}");
    }
}
