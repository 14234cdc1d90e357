use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};

/// A position on the token ring.
///
/// Tokens are totally ordered. [`Token::MIN`] sorts before every other token
/// but, because ranges are left-exclusive, it is contained in the range that
/// wraps around the end of the ring.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct Token(u128);

impl Token {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(u128::MAX);

    #[must_use]
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u128 {
        self.0
    }
}

impl From<u128> for Token {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A row key paired with the token the partitioner assigned to it.
///
/// Ordered by token first so that iteration order matches ring order.
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize,
)]
pub struct DecoratedKey {
    pub token: Token,
    pub key: String,
}

impl DecoratedKey {
    #[must_use]
    pub const fn new(token: Token, key: String) -> Self {
        Self { token, key }
    }
}

impl fmt::Display for DecoratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.token)
    }
}
