#[cfg(test)]
#[path = "tests/range.rs"]
mod tests;

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::token::Token;

/// A range of the ring, `(left, right]`.
///
/// A range whose right bound is not greater than its left bound wraps around
/// the end of the ring. `(t, t]` covers the whole ring.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct Range {
    pub left: Token,
    pub right: Token,
}

impl Range {
    #[must_use]
    pub const fn new(left: Token, right: Token) -> Self {
        Self { left, right }
    }

    /// The range covering the whole ring, anchored at `token`.
    #[must_use]
    pub const fn full(token: Token) -> Self {
        Self::new(token, token)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.left == self.right
    }

    #[must_use]
    pub fn is_wrap_around(&self) -> bool {
        is_wrap_around(self.left, self.right)
    }

    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        if self.is_wrap_around() {
            // (left, MAX] or [MIN, right]
            token > self.left || token <= self.right
        } else {
            token > self.left && token <= self.right
        }
    }

    /// Whether `other` lies entirely within this range.
    #[must_use]
    pub fn contains_range(&self, other: &Self) -> bool {
        if self.is_full() {
            return true;
        }

        let this_wraps = self.is_wrap_around();
        let that_wraps = other.is_wrap_around();

        if this_wraps == that_wraps {
            self.left <= other.left && other.right <= self.right
        } else if this_wraps {
            // a plain range sits inside a wrapping one if it is on either side of the wrap
            self.left <= other.left || other.right <= self.right
        } else {
            false
        }
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let this_wraps = self.is_wrap_around();
        let that_wraps = other.is_wrap_around();

        match (this_wraps, that_wraps) {
            // both contain the end of the ring
            (true, true) => true,
            (false, false) => self.left < other.right && other.left < self.right,
            (true, false) => self.left < other.right || other.left < self.right,
            (false, true) => other.left < self.right || self.left < other.right,
        }
    }
}

fn is_wrap_around(left: Token, right: Token) -> bool {
    left >= right
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}]", self.left, self.right)
    }
}
