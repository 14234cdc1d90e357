//! Merkle hash tree over the token ring.
//!
//! The tree partitions the ring into disjoint, wrap-respecting leaf ranges.
//! Each leaf holds the XOR of the hashes of every row whose token falls in
//! it; inner nodes are the XOR of their children. Because XOR commutes, the
//! hash of a region depends only on the rows in it, not on insertion order or
//! on how finely the region happens to be split. Two nodes that sampled their
//! keys differently (and so built differently shaped trees) can still compare
//! the regions both trees resolve.
//!
//! ## Lifecycle
//!
//! 1. [`MerkleTree::new`], then [`MerkleTree::init`] or repeated
//!    [`MerkleTree::split`] to fix the leaf ranges
//! 2. [`MerkleTree::add_hash`] for every row, driven by [`MerkleTree::invalids`]
//! 3. [`difference`] against another tree, any number of times
//!
//! The partitioner reference is not part of the wire encoding; a tree decoded
//! from the network must have it reattached with
//! [`MerkleTree::set_partitioner`] before it can be split or compared.

use std::fmt;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use strand_primitives::{Hash, Partitioner, Range, Token};
use thiserror::Error;
use tracing::trace;


/// Default maximum depth of a leaf.
pub const RECOMMENDED_DEPTH: u8 = 126;

/// Default maximum number of leaves.
pub const DEFAULT_MAX_SIZE: u64 = 1 << 15;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MerkleError {
    #[error("tree has no partitioner attached")]
    MissingPartitioner,

    #[error("range {range} is not a leaf of this tree (leaf is {leaf})")]
    NotALeaf { range: Range, leaf: Range },
}

/// A range of the tree together with its depth.
///
/// A range at depth `d` covers `2^-d` of the ring.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TreeRange {
    pub range: Range,
    pub depth: u8,
}

impl TreeRange {
    #[must_use]
    pub const fn new(range: Range, depth: u8) -> Self {
        Self { range, depth }
    }

    /// Fraction of the ring this range covers.
    #[must_use]
    pub fn size_fraction(&self) -> f64 {
        0.5_f64.powi(i32::from(self.depth))
    }

    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        self.range.contains(token)
    }

    #[must_use]
    pub fn intersects(&self, range: &Range) -> bool {
        self.range.intersects(range)
    }
}

impl fmt::Display for TreeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.range, self.depth)
    }
}

#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
enum Node {
    /// `None` until the leaf has been populated.
    Leaf(Option<Hash>),
    Inner {
        token: Token,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn split_at(token: Token) -> Self {
        Self::Inner {
            token,
            left: Box::new(Self::Leaf(None)),
            right: Box::new(Self::Leaf(None)),
        }
    }
}

/// A binary hash tree over the ring.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub struct MerkleTree {
    hash_depth: u8,
    max_size: u64,
    size: u64,
    minimum: Token,
    root: Node,
    #[borsh(skip)]
    partitioner: Option<Arc<dyn Partitioner>>,
}

impl MerkleTree {
    /// A tree of a single invalid leaf covering the whole ring.
    #[must_use]
    pub fn new(partitioner: Arc<dyn Partitioner>, hash_depth: u8, max_size: u64) -> Self {
        Self {
            hash_depth,
            max_size: max_size.max(1),
            size: 1,
            minimum: partitioner.minimum_token(),
            root: Node::Leaf(None),
            partitioner: Some(partitioner),
        }
    }

    #[must_use]
    pub fn partitioner(&self) -> Option<&Arc<dyn Partitioner>> {
        self.partitioner.as_ref()
    }

    pub fn set_partitioner(&mut self, partitioner: Arc<dyn Partitioner>) {
        self.partitioner = Some(partitioner);
    }

    fn require_partitioner(&self) -> Result<&Arc<dyn Partitioner>, MerkleError> {
        self.partitioner.as_ref().ok_or(MerkleError::MissingPartitioner)
    }

    /// Number of leaves.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    #[must_use]
    pub const fn hash_depth(&self) -> u8 {
        self.hash_depth
    }

    /// The range covering the whole ring.
    #[must_use]
    pub const fn full_range(&self) -> Range {
        Range::full(self.minimum)
    }

    /// Rebuild the tree as an evenly split, unpopulated tree.
    ///
    /// The depth is the smaller of `log2(max_size)` and the hash depth.
    pub fn init(&mut self) -> Result<(), MerkleError> {
        let partitioner = Arc::clone(self.require_partitioner()?);

        let size_depth = self
            .max_size
            .checked_ilog2()
            .map_or(0, |depth| u8::try_from(depth).unwrap_or(u8::MAX));
        let depth = size_depth.min(self.hash_depth);

        let (root, size) = init_helper(
            partitioner.as_ref(),
            self.minimum,
            self.minimum,
            0,
            depth,
        );
        self.root = root;
        self.size = size;

        Ok(())
    }

    /// Bisect the leaf containing `token`.
    ///
    /// Returns `false`, leaving the tree untouched, once the tree holds
    /// `max_size` leaves, when the leaf is already at the hash depth, or when
    /// its range is too small to bisect.
    pub fn split(&mut self, token: Token) -> Result<bool, MerkleError> {
        let partitioner = Arc::clone(self.require_partitioner()?);

        if self.size >= self.max_size {
            return Ok(false);
        }

        let full = self.full_range();
        let split = split_helper(
            &mut self.root,
            partitioner.as_ref(),
            full,
            0,
            self.hash_depth,
            token,
        );

        if split {
            self.size = self.size.saturating_add(1);
        }

        Ok(split)
    }

    /// The leaf range containing `token`, with its current hash.
    #[must_use]
    pub fn get(&self, token: Token) -> (TreeRange, Option<Hash>) {
        let mut node = &self.root;
        let mut active = TreeRange::new(self.full_range(), 0);

        loop {
            match node {
                Node::Leaf(hash) => return (active, *hash),
                Node::Inner { token: mid, left, right } => {
                    let (next, range) = descend(active.range, *mid, token, left, right);
                    node = next;
                    active = TreeRange::new(range, active.depth.saturating_add(1));
                }
            }
        }
    }

    fn leaf_mut(&mut self, token: Token) -> (Range, &mut Option<Hash>) {
        let full = self.full_range();
        leaf_mut_helper(&mut self.root, full, token)
    }

    /// Mix a row hash into the leaf `range`.
    ///
    /// The combine is XOR, so calls commute.
    pub fn add_hash(&mut self, range: &TreeRange, row_hash: Hash) -> Result<(), MerkleError> {
        let (leaf, hash) = self.leaf_mut(range.range.right);

        if leaf != range.range {
            return Err(MerkleError::NotALeaf {
                range: range.range,
                leaf,
            });
        }

        *hash = Some(hash.map_or(row_hash, |current| current ^ row_hash));

        Ok(())
    }

    /// Mark the leaf containing `token` as unpopulated.
    pub fn invalidate(&mut self, token: Token) {
        let (_, hash) = self.leaf_mut(token);
        *hash = None;
    }

    /// Hash of `range`, if this tree resolves it.
    ///
    /// `None` when some leaf in the range is unpopulated, when the tree is too
    /// coarse to isolate the range, or when the range does not line up with
    /// the tree's split points.
    #[must_use]
    pub fn hash(&self, range: &Range) -> Option<Hash> {
        hash_helper(&self.root, self.full_range(), range)
    }

    /// Hash of the whole ring.
    #[must_use]
    pub fn root_hash(&self) -> Option<Hash> {
        self.hash(&self.full_range())
    }

    /// Every leaf in ring order, starting after the minimum token.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![(&self.root, TreeRange::new(self.full_range(), 0))],
        }
    }

    /// Unpopulated leaves lying within `range`, in ring order.
    pub fn invalids(&self, range: Range) -> impl Iterator<Item = TreeRange> + '_ {
        self.leaves()
            .filter(move |(leaf, hash)| hash.is_none() && range.contains_range(&leaf.range))
            .map(|(leaf, _)| leaf)
    }
}

/// Lazy in-order walk over the leaves of a tree.
#[derive(Debug)]
pub struct Leaves<'a> {
    stack: Vec<(&'a Node, TreeRange)>,
}

impl Iterator for Leaves<'_> {
    type Item = (TreeRange, Option<Hash>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, active)) = self.stack.pop() {
            match node {
                Node::Leaf(hash) => return Some((active, *hash)),
                Node::Inner { token, left, right } => {
                    let depth = active.depth.saturating_add(1);
                    self.stack.push((
                        right,
                        TreeRange::new(Range::new(*token, active.range.right), depth),
                    ));
                    self.stack.push((
                        left,
                        TreeRange::new(Range::new(active.range.left, *token), depth),
                    ));
                }
            }
        }

        None
    }
}

fn descend<'a>(
    active: Range,
    mid: Token,
    token: Token,
    left: &'a Node,
    right: &'a Node,
) -> (&'a Node, Range) {
    let left_range = Range::new(active.left, mid);

    if left_range.contains(token) {
        (left, left_range)
    } else {
        (right, Range::new(mid, active.right))
    }
}

fn leaf_mut_helper(node: &mut Node, active: Range, token: Token) -> (Range, &mut Option<Hash>) {
    match node {
        Node::Leaf(hash) => (active, hash),
        Node::Inner { token: mid, left, right } => {
            let left_range = Range::new(active.left, *mid);
            if left_range.contains(token) {
                leaf_mut_helper(left, left_range, token)
            } else {
                leaf_mut_helper(right, Range::new(*mid, active.right), token)
            }
        }
    }
}

fn init_helper(
    partitioner: &dyn Partitioner,
    left: Token,
    right: Token,
    depth: u8,
    max_depth: u8,
) -> (Node, u64) {
    if depth >= max_depth {
        return (Node::Leaf(None), 1);
    }

    let mid = partitioner.midpoint(left, right);
    if mid == left || mid == right {
        return (Node::Leaf(None), 1);
    }

    let next = depth.saturating_add(1);
    let (lchild, lsize) = init_helper(partitioner, left, mid, next, max_depth);
    let (rchild, rsize) = init_helper(partitioner, mid, right, next, max_depth);

    let node = Node::Inner {
        token: mid,
        left: Box::new(lchild),
        right: Box::new(rchild),
    };

    (node, lsize.saturating_add(rsize))
}

fn split_helper(
    node: &mut Node,
    partitioner: &dyn Partitioner,
    active: Range,
    depth: u8,
    hash_depth: u8,
    token: Token,
) -> bool {
    if depth >= hash_depth {
        return false;
    }

    match node {
        Node::Leaf(_) => {
            let mid = partitioner.midpoint(active.left, active.right);
            if mid == active.left || mid == active.right {
                return false;
            }

            *node = Node::split_at(mid);
            true
        }
        Node::Inner { token: mid, left, right } => {
            let left_range = Range::new(active.left, *mid);
            let next = depth.saturating_add(1);

            if left_range.contains(token) {
                split_helper(left, partitioner, left_range, next, hash_depth, token)
            } else {
                let right_range = Range::new(*mid, active.right);
                split_helper(right, partitioner, right_range, next, hash_depth, token)
            }
        }
    }
}

fn hash_helper(node: &Node, active: Range, range: &Range) -> Option<Hash> {
    match node {
        // a leaf only answers for ranges covering it entirely
        Node::Leaf(hash) => range.contains_range(&active).then_some(*hash)?,
        Node::Inner { token, left, right } => {
            let left_active = Range::new(active.left, *token);
            let right_active = Range::new(*token, active.right);

            if range.contains_range(&active) {
                let lhash = hash_helper(left, left_active, range)?;
                let rhash = hash_helper(right, right_active, range)?;
                return Some(lhash ^ rhash);
            }

            if left_active.contains_range(range) {
                hash_helper(left, left_active, range)
            } else if right_active.contains_range(range) {
                hash_helper(right, right_active, range)
            } else {
                None
            }
        }
    }
}

enum Comparison {
    Consistent,
    /// The whole range disagrees, or cannot be resolved any further.
    FullyInconsistent,
    /// Only the listed sub-ranges disagree.
    PartiallyInconsistent(Vec<TreeRange>),
}

/// The smallest ranges on which `ltree` and `rtree` disagree, in ring order.
///
/// A range is reported whole when either tree cannot resolve it further, so
/// the depth of each result reflects the coarser of the two trees there.
pub fn difference(ltree: &MerkleTree, rtree: &MerkleTree) -> Result<Vec<TreeRange>, MerkleError> {
    let partitioner = ltree.require_partitioner()?;
    if rtree.partitioner.is_none() {
        return Err(MerkleError::MissingPartitioner);
    }

    let active = TreeRange::new(ltree.full_range(), 0);

    let diff = match compare(ltree, rtree, partitioner.as_ref(), active) {
        Comparison::Consistent => Vec::new(),
        Comparison::FullyInconsistent => vec![active],
        Comparison::PartiallyInconsistent(ranges) => ranges,
    };

    trace!(ranges = diff.len(), "computed tree difference");

    Ok(diff)
}

fn compare(
    ltree: &MerkleTree,
    rtree: &MerkleTree,
    partitioner: &dyn Partitioner,
    active: TreeRange,
) -> Comparison {
    let (Some(lhash), Some(rhash)) = (ltree.hash(&active.range), rtree.hash(&active.range)) else {
        return Comparison::FullyInconsistent;
    };

    if lhash == rhash {
        return Comparison::Consistent;
    }

    let mid = partitioner.midpoint(active.range.left, active.range.right);
    if active.depth == u8::MAX || mid == active.range.left || mid == active.range.right {
        return Comparison::FullyInconsistent;
    }

    let depth = active.depth.saturating_add(1);
    let left = TreeRange::new(Range::new(active.range.left, mid), depth);
    let right = TreeRange::new(Range::new(mid, active.range.right), depth);

    let ldiff = compare(ltree, rtree, partitioner, left);
    let rdiff = compare(ltree, rtree, partitioner, right);

    match (ldiff, rdiff) {
        (Comparison::FullyInconsistent, Comparison::FullyInconsistent) => {
            Comparison::FullyInconsistent
        }
        (Comparison::Consistent, Comparison::Consistent) => Comparison::Consistent,
        (ldiff, rdiff) => {
            let mut ranges = Vec::new();
            for (half, diff) in [(left, ldiff), (right, rdiff)] {
                match diff {
                    Comparison::Consistent => {}
                    Comparison::FullyInconsistent => ranges.push(half),
                    Comparison::PartiallyInconsistent(sub) => ranges.extend(sub),
                }
            }
            Comparison::PartiallyInconsistent(ranges)
        }
    }
}
