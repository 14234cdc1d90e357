use std::fmt::Debug;

use sha2::{Digest, Sha256};

use crate::token::{DecoratedKey, Token};

/// Maps keys onto the token ring.
///
/// Only the pieces of ring arithmetic the hash tree needs are exposed.
pub trait Partitioner: Debug + Send + Sync {
    fn minimum_token(&self) -> Token;

    /// The token halfway around the ring from `left` towards `right`.
    ///
    /// When `left == right` the whole ring is bisected.
    fn midpoint(&self, left: Token, right: Token) -> Token;

    fn token_for(&self, key: &[u8]) -> Token;

    fn decorate(&self, key: String) -> DecoratedKey {
        let token = self.token_for(key.as_bytes());
        DecoratedKey::new(token, key)
    }
}

/// Places keys on the ring by the leading 128 bits of their SHA-256 digest.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Partitioner;

impl Partitioner for Sha256Partitioner {
    fn minimum_token(&self) -> Token {
        Token::MIN
    }

    fn midpoint(&self, left: Token, right: Token) -> Token {
        let left = left.value();
        let right = right.value();

        let half = if left == right {
            1_u128 << 127_u32
        } else {
            // ring distance, correct for wrapping ranges as well
            right.wrapping_sub(left) >> 1_u32
        };

        Token::new(left.wrapping_add(half))
    }

    fn token_for(&self, key: &[u8]) -> Token {
        let digest = Sha256::digest(key);
        let mut prefix = [0_u8; 16];
        prefix.copy_from_slice(&digest[..16]);

        Token::new(u128::from_be_bytes(prefix))
    }
}
