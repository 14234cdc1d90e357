//! Builds a column family's hash tree from a single ordered scan.
//!
//! ## Lifecycle
//!
//! 1. [`Validator::prepare`] shapes the tree from sampled keys
//! 2. [`Validator::add`] for every row, in ascending token order
//! 3. [`Validator::complete`] fills the remaining ranges and yields the tree
//!
//! The minimum token sorts first but belongs to the last range of the ring,
//! so rows carrying it are held back and mixed into the final range on
//! completion.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use strand_merkle::{MerkleError, MerkleTree, TreeRange};
use strand_primitives::{CfPair, DecoratedKey, Hash, Partitioner, Range, Token};
use thiserror::Error;
use tracing::debug;

use crate::storage::CompactedRow;

#[cfg(test)]
#[path = "tests/validator.rs"]
mod tests;

/// Hash mixed into ranges that hold no rows.
pub const EMPTY_ROW: Hash = Hash::ZERO;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidatorError {
    #[error("validator for {0} was not prepared")]
    NotPrepared(CfPair),

    #[error("no range left for token {token} in {cf}")]
    RangesExhausted { cf: CfPair, token: Token },

    #[error(transparent)]
    Tree(#[from] MerkleError),
}

/// Scan position, present once the validator is prepared.
#[derive(Debug)]
struct Cursor {
    /// `None` once every minimum-token row has been consumed.
    min_token: Option<Token>,
    min_rows: Vec<Hash>,
    range: Option<TreeRange>,
    ranges: VecDeque<TreeRange>,
}

#[derive(Debug)]
pub struct Validator {
    cf: CfPair,
    tree: MerkleTree,
    cursor: Option<Cursor>,
    validated: u64,
}

impl Validator {
    #[must_use]
    pub fn new(cf: CfPair, partitioner: Arc<dyn Partitioner>, hash_depth: u8, max_size: u64) -> Self {
        Self::with_tree(cf, MerkleTree::new(partitioner, hash_depth, max_size))
    }

    #[must_use]
    pub const fn with_tree(cf: CfPair, tree: MerkleTree) -> Self {
        Self {
            cf,
            tree,
            cursor: None,
            validated: 0,
        }
    }

    #[must_use]
    pub const fn cf(&self) -> &CfPair {
        &self.cf
    }

    /// Rows consumed so far.
    #[must_use]
    pub const fn validated(&self) -> u64 {
        self.validated
    }

    /// Shape the tree after the key distribution, then start the scan.
    ///
    /// With no samples the tree is split evenly; otherwise it is split at
    /// randomly chosen sample tokens until it refuses to split further.
    pub fn prepare(&mut self, sample_keys: &[DecoratedKey]) -> Result<(), ValidatorError> {
        self.prepare_with(sample_keys, &mut rand::thread_rng())
    }

    pub fn prepare_with<R: Rng + ?Sized>(
        &mut self,
        sample_keys: &[DecoratedKey],
        rng: &mut R,
    ) -> Result<(), ValidatorError> {
        if sample_keys.is_empty() {
            self.tree.init()?;
        } else {
            while let Some(key) = sample_keys.choose(rng) {
                if !self.tree.split(key.token)? {
                    break;
                }
            }
        }

        debug!(cf = %self.cf, size = self.tree.size(), "Prepared validation tree");

        let min_token = self
            .tree
            .partitioner()
            .ok_or(MerkleError::MissingPartitioner)?
            .minimum_token();

        self.cursor = Some(Cursor {
            min_token: Some(min_token),
            min_rows: Vec::new(),
            range: None,
            ranges: self.tree.invalids(Range::full(min_token)).collect(),
        });

        Ok(())
    }

    /// Hash a row into the tree. Rows must arrive in ascending token order.
    pub fn add(&mut self, row: &CompactedRow) -> Result<(), ValidatorError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Err(ValidatorError::NotPrepared(self.cf.clone()));
        };

        let token = row.key.token;
        self.validated = self.validated.saturating_add(1);

        if let Some(min_token) = cursor.min_token {
            if token == min_token {
                cursor.min_rows.push(row_hash(row));
                return Ok(());
            }
            cursor.min_token = None;
        }

        loop {
            let range = match cursor.range {
                Some(range) => range,
                None => {
                    let Some(next) = cursor.ranges.pop_front() else {
                        return Err(ValidatorError::RangesExhausted {
                            cf: self.cf.clone(),
                            token,
                        });
                    };
                    cursor.range = Some(next);
                    next
                }
            };

            if range.contains(token) {
                self.tree.add_hash(&range, row_hash(row))?;
                return Ok(());
            }

            // nothing more will land in this range
            self.tree.add_hash(&range, EMPTY_ROW)?;
            cursor.range = None;
        }
    }

    /// Finish the scan and hand back the completed tree.
    pub fn complete(mut self) -> Result<MerkleTree, ValidatorError> {
        let Some(mut cursor) = self.cursor.take() else {
            return Err(ValidatorError::NotPrepared(self.cf));
        };

        let mut last = cursor.range.take();
        if let Some(range) = last {
            self.tree.add_hash(&range, EMPTY_ROW)?;
        }

        while let Some(range) = cursor.ranges.pop_front() {
            self.tree.add_hash(&range, EMPTY_ROW)?;
            last = Some(range);
        }

        if !cursor.min_rows.is_empty() {
            // the scan may have started with every range already valid
            let last = match last {
                Some(range) => range,
                None => self.tree.get(cursor.min_token.unwrap_or_default()).0,
            };

            for row_hash in cursor.min_rows {
                self.tree.add_hash(&last, row_hash)?;
            }
        }

        debug!(cf = %self.cf, rows = self.validated, "Validated rows into tree");

        Ok(self.tree)
    }
}

/// SHA-256 over the row key, header and data.
#[must_use]
pub fn row_hash(row: &CompactedRow) -> Hash {
    Hash::of_parts([
        row.key.key.as_bytes(),
        row.header.as_slice(),
        row.data.as_slice(),
    ])
}
