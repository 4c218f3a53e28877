//! Hashing primitives for Paycoin.
//!
//! Block and transaction identifiers are double SHA-256 digests. They are
//! stored in the byte order they appear on the wire and shown reversed,
//! which is how block explorers and RPC interfaces print them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::CodecError;

/// A 32-byte double SHA-256 hash in wire byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha256Hash {
    /// The all-zero hash, used by coinbase outpoints and genesis headers.
    pub const ZERO: Sha256Hash = Sha256Hash([0u8; 32]);

    /// Creates a hash from a byte slice in wire order.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Returns the hash bytes in wire order.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Double SHA-256 of `data`.
    pub fn double_sha256(data: &[u8]) -> Self {
        double_sha256(data)
    }

    /// Parses the reversed hex form printed by [`fmt::Display`].
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let mut bytes = hex::decode(s)
            .map_err(|e| CodecError::violation(format!("invalid hash hex: {}", e)))?;
        bytes.reverse();
        Self::from_slice(&bytes)
            .ok_or_else(|| CodecError::violation(format!("hash must be 32 bytes, got {}", bytes.len())))
    }

    /// Reversed hex form.
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }

    /// True for the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Hash({})", self)
    }
}

impl FromStr for Sha256Hash {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Sha256Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha256Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Computes SHA-256 twice over `data`.
pub fn double_sha256(data: &[u8]) -> Sha256Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&second);
    Sha256Hash(hash)
}

/// Merkle root over transaction hashes, pairing neighbours level by level
/// and duplicating the last hash of an odd level.
pub fn merkle_root(hashes: &[Sha256Hash]) -> Sha256Hash {
    if hashes.is_empty() {
        return Sha256Hash::ZERO;
    }
    let mut level: Vec<Sha256Hash> = hashes.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(&left.0);
                buf[32..].copy_from_slice(&right.0);
                double_sha256(&buf)
            })
            .collect();
    }
    level[0]
}
