#[cfg(test)]
#[path = "tests/row.rs"]
mod tests;

use std::collections::BTreeMap;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

use crate::hash::Hash;

/// A single named value with its write timestamp.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct Column {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
    pub timestamp: i64,
    /// Set when the column is a deletion marker.
    pub deleted: bool,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            timestamp,
            deleted: false,
        }
    }

    #[must_use]
    pub fn tombstone(name: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value: Vec::new(),
            timestamp,
            deleted: true,
        }
    }

    /// Whether this version of the column beats `other`.
    ///
    /// Higher timestamps win. Ties go to deletions, then to the larger value,
    /// so the outcome does not depend on which side is asked.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        (self.timestamp, self.deleted, &self.value) > (other.timestamp, other.deleted, &other.value)
    }
}

/// The columns a row holds within one column family, sorted by name.
#[derive(Clone, Debug, Default, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct ColumnFamily {
    pub name: String,
    /// Timestamp of a family-wide deletion, if any.
    pub deleted_at: Option<i64>,
    columns: BTreeMap<Vec<u8>, Column>,
}

impl ColumnFamily {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deleted_at: None,
            columns: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: Column) -> Self {
        self.add(column);
        self
    }

    /// Add a column, keeping whichever version supersedes the other.
    pub fn add(&mut self, column: Column) {
        match self.columns.get(&column.name) {
            Some(existing) if !column.supersedes(existing) => {}
            _ => {
                let _previous = self.columns.insert(column.name.clone(), column);
            }
        }
    }

    pub fn delete(&mut self, timestamp: i64) {
        self.deleted_at = self.deleted_at.max(Some(timestamp));
    }

    #[must_use]
    pub fn column(&self, name: &[u8]) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.deleted_at.is_none()
    }

    /// Merge `other` into this version, column by column.
    ///
    /// Associative, commutative and idempotent: merging the same set of
    /// versions in any order yields the same result.
    pub fn resolve(&mut self, other: &Self) {
        if let Some(timestamp) = other.deleted_at {
            self.delete(timestamp);
        }

        for column in other.columns.values() {
            self.add(column.clone());
        }
    }

    /// Merge a set of versions into their superset.
    ///
    /// Returns `None` only when `versions` is empty.
    #[must_use]
    pub fn resolve_superset<'a, I>(versions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut versions = versions.into_iter();
        let mut resolved = versions.next()?.clone();

        for version in versions {
            resolved.resolve(version);
        }

        Some(resolved)
    }

    /// What this version is missing relative to `superset`.
    ///
    /// Returns the columns (and family deletion) that `superset` holds and this
    /// version lacks or holds at a losing version. `None` means nothing is
    /// missing.
    #[must_use]
    pub fn diff(&self, superset: &Self) -> Option<Self> {
        let mut missing = Self::new(self.name.clone());

        if superset.deleted_at > self.deleted_at {
            missing.deleted_at = superset.deleted_at;
        }

        for column in superset.columns.values() {
            match self.columns.get(&column.name) {
                Some(ours) if !column.supersedes(ours) => {}
                _ => missing.add(column.clone()),
            }
        }

        (!missing.is_empty()).then_some(missing)
    }

    /// Digest of the family's content, as carried by digest-only read responses.
    #[must_use]
    pub fn digest(&self) -> Hash {
        let mut hasher = Sha256::new();

        match self.deleted_at {
            Some(deleted_at) => {
                hasher.update([1]);
                hasher.update(deleted_at.to_be_bytes());
            }
            None => hasher.update([0]),
        }

        // names and values are length-prefixed so that no two families share
        // a byte stream
        for column in self.columns.values() {
            update_framed(&mut hasher, &column.name);
            update_framed(&mut hasher, &column.value);
            hasher.update(column.timestamp.to_be_bytes());
            hasher.update([u8::from(column.deleted)]);
        }

        let bytes: [u8; 32] = hasher.finalize().into();
        bytes.into()
    }
}

fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update(u64::try_from(bytes.len()).unwrap_or(u64::MAX).to_be_bytes());
    hasher.update(bytes);
}

/// A row key with its column family contents.
#[derive(Clone, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct Row {
    pub key: String,
    pub cf: ColumnFamily,
}

impl Row {
    #[must_use]
    pub const fn new(key: String, cf: ColumnFamily) -> Self {
        Self { key, cf }
    }

    #[must_use]
    pub fn digest(&self) -> Hash {
        self.cf.digest()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row({}, {} columns)", self.key, self.cf.len())
    }
}
