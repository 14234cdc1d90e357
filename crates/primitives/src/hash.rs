#[cfg(test)]
#[path = "tests/hash.rs"]
mod tests;

use std::fmt;
use std::ops::{BitXor, BitXorAssign, Deref};
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const BYTES_LEN: usize = 32;

/// A 32-byte SHA-256 digest.
///
/// Digests of rows are combined into tree leaves with XOR, so the same set of
/// row hashes produces the same leaf no matter the insertion order. The zero
/// hash is the identity of that combine and doubles as the empty-row hash.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, BorshSerialize, BorshDeserialize)]
pub struct Hash {
    bytes: [u8; BYTES_LEN],
}

impl Hash {
    pub const ZERO: Self = Self {
        bytes: [0; BYTES_LEN],
    };

    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: Sha256::digest(data).into(),
        }
    }

    /// Hash several byte slices as if they were concatenated.
    #[must_use]
    pub fn of_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }

        Self {
            bytes: hasher.finalize().into(),
        }
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BYTES_LEN] {
        &self.bytes
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.bytes == [0; BYTES_LEN]
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl From<[u8; BYTES_LEN]> for Hash {
    fn from(bytes: [u8; BYTES_LEN]) -> Self {
        Self { bytes }
    }
}

impl From<Hash> for [u8; BYTES_LEN] {
    fn from(hash: Hash) -> Self {
        hash.bytes
    }
}

impl Deref for Hash {
    type Target = [u8; BYTES_LEN];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl BitXorAssign for Hash {
    fn bitxor_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.bytes.iter_mut().zip(rhs.bytes) {
            *lhs ^= rhs;
        }
    }
}

impl BitXor for Hash {
    type Output = Self;

    fn bitxor(mut self, rhs: Self) -> Self::Output {
        self ^= rhs;
        self
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_hex()).finish()
    }
}

#[derive(Clone, Copy, Debug, Error)]
pub enum Error {
    #[error("invalid hash length")]
    InvalidLength,

    #[error("invalid hex")]
    DecodeError(#[from] hex::FromHexError),
}

impl FromStr for Hash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; BYTES_LEN];

        match hex::decode_to_slice(s, &mut bytes) {
            Ok(()) => Ok(Self { bytes }),
            Err(hex::FromHexError::InvalidStringLength) => Err(Error::InvalidLength),
            Err(err) => Err(Error::DecodeError(err)),
        }
    }
}
