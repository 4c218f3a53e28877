use serde::{Deserialize, Serialize};

use crate::crypto::Sha256Hash;
use crate::error::Result;
use crate::serialization::ByteReader;

/// Reference to an output of an earlier transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the transaction holding the output
    pub txid: Sha256Hash,
    /// Index of the output in that transaction
    pub index: u32,
}

impl OutPoint {
    /// Encoded size: hash plus index.
    pub const SIZE: usize = 36;

    /// Creates an outpoint.
    pub fn new(txid: Sha256Hash, index: u32) -> Self {
        Self { txid, index }
    }

    /// The outpoint a coinbase input spends.
    pub fn null() -> Self {
        Self {
            txid: Sha256Hash::ZERO,
            index: u32::MAX,
        }
    }

    /// True for the coinbase outpoint.
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }

    pub(crate) fn read(reader: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            txid: reader.read_hash()?,
            index: reader.read_u32_le()?,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.txid.as_bytes());
        out.extend_from_slice(&self.index.to_le_bytes());
    }
}
