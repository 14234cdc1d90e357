use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};

/// Identity of a column family: the table it belongs to and its own name.
///
/// Every tree, request and rendezvous slot is correlated by this pair.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize)]
pub struct CfPair {
    pub table: String,
    pub column_family: String,
}

impl CfPair {
    #[must_use]
    pub fn new(table: impl Into<String>, column_family: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column_family: column_family.into(),
        }
    }
}

impl fmt::Display for CfPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.table, self.column_family)
    }
}
