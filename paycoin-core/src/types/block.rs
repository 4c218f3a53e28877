//! Blocks: an 80-byte header followed by a body of transactions and the
//! proof-of-stake block signature.
//!
//! Header and body are separate nodes, each lazily parsed and cached on
//! its own. Reading the difficulty target never parses the transactions,
//! and editing a transaction leaves the header's cached bytes intact.
//! The merkle root is not recomputed on edits; call
//! [`Block::compute_merkle_root`] and [`Block::set_merkle_root`] for that.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{merkle_root, Sha256Hash};
use crate::error::{CodecError, Result};
use crate::message::{recache_children, Fields, Message, Node, ParseConfig};
use crate::serialization::{var_bytes_size, varint_size, write_var_bytes, write_varint, ByteReader};
use crate::types::transaction::MIN_TRANSACTION_SIZE;
use crate::types::Transaction;

/// Encoded size of a block header.
pub const HEADER_SIZE: usize = 80;

/// Block header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: u32,
    /// Hash of the previous block
    pub prev_block_hash: Sha256Hash,
    /// Merkle root of the transaction hashes
    pub merkle_root: Sha256Hash,
    /// Block timestamp
    pub time: u32,
    /// Difficulty target in compact form
    pub difficulty_target: u32,
    /// Proof-of-work nonce
    pub nonce: u32,
}

impl Fields for BlockHeader {
    fn scan(reader: &mut ByteReader) -> Result<()> {
        reader.skip(HEADER_SIZE)
    }

    fn parse(reader: &mut ByteReader, _config: ParseConfig) -> Result<Self> {
        Ok(Self {
            version: reader.read_u32_le()?,
            prev_block_hash: reader.read_hash()?,
            merkle_root: reader.read_hash()?,
            time: reader.read_u32_le()?,
            difficulty_target: reader.read_u32_le()?,
            nonce: reader.read_u32_le()?,
        })
    }

    fn encoded_len(&self) -> usize {
        HEADER_SIZE
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(self.prev_block_hash.as_bytes());
        out.extend_from_slice(self.merkle_root.as_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.difficulty_target.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BlockBody {
    transactions: Vec<Transaction>,
    signature: Bytes,
}

impl Fields for BlockBody {
    fn scan(reader: &mut ByteReader) -> Result<()> {
        for _ in 0..reader.read_count(MIN_TRANSACTION_SIZE, "transaction")? {
            Transaction::scan(reader)?;
        }
        reader.skip_var_bytes()
    }

    fn parse(reader: &mut ByteReader, config: ParseConfig) -> Result<Self> {
        let transactions = (0..reader.read_count(MIN_TRANSACTION_SIZE, "transaction")?)
            .map(|_| Transaction::read(reader, config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            transactions,
            signature: reader.read_var_bytes()?,
        })
    }

    fn encoded_len(&self) -> usize {
        varint_size(self.transactions.len() as u64)
            + self.transactions.iter().map(|tx| tx.length()).sum::<usize>()
            + var_bytes_size(self.signature.len())
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        write_varint(out, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.serialize_into(out)?;
        }
        write_var_bytes(out, &self.signature);
        Ok(())
    }

    fn recache(&mut self, raw: &Bytes) {
        let offset = varint_size(self.transactions.len() as u64);
        recache_children(self.transactions.iter_mut().map(|tx| &mut tx.node), raw, offset);
    }
}

/// A block, or just its header when decoded from a header-only source.
#[derive(Debug, Clone)]
pub struct Block {
    header: Node<BlockHeader>,
    body: Option<Node<BlockBody>>,
    // Whole-block bytes, held only while both sections are cached
    raw: Option<Bytes>,
}

impl Block {
    /// A header-only block built from field values.
    pub fn new(header: BlockHeader) -> Self {
        Self {
            header: Node::from_fields(header, ParseConfig::default()),
            body: None,
            raw: None,
        }
    }

    /// Decodes a full block from the start of `bytes`.
    pub fn from_bytes(bytes: impl Into<Bytes>, config: ParseConfig) -> Result<Self> {
        let mut reader = ByteReader::new(bytes.into());
        Self::read(&mut reader, config)
    }

    /// Decodes only the 80-byte header at the start of `bytes`.
    pub fn header_from_bytes(bytes: impl Into<Bytes>, config: ParseConfig) -> Result<Self> {
        Ok(Self {
            header: Node::from_bytes(bytes.into(), config)?,
            body: None,
            raw: None,
        })
    }

    /// Reads header and body at the reader's cursor.
    pub fn read(reader: &mut ByteReader, config: ParseConfig) -> Result<Self> {
        let start = reader.position();
        let header = Node::read(reader, config)?;
        let body = Node::read(reader, config)?;
        Ok(Self {
            header,
            body: Some(body),
            raw: config.retain.then(|| reader.slice_from(start)),
        })
    }

    /// A copy holding only the header.
    pub fn clone_as_header(&self) -> Self {
        Self {
            header: self.header.clone(),
            body: None,
            raw: None,
        }
    }

    /// Block hash: double SHA-256 of the header.
    pub fn hash(&self) -> Result<Sha256Hash> {
        self.header.digest()
    }

    /// Header fields, parsing the header on first access.
    pub fn header(&self) -> Result<&BlockHeader> {
        self.header.fields()
    }

    /// Mutable header fields. Only the header cache goes stale.
    pub fn header_mut(&mut self) -> Result<&mut BlockHeader> {
        self.raw = None;
        self.header.fields_mut()
    }

    /// Version field.
    pub fn version(&self) -> Result<u32> {
        Ok(self.header()?.version)
    }

    /// Sets the version.
    pub fn set_version(&mut self, version: u32) -> Result<()> {
        self.header_mut()?.version = version;
        Ok(())
    }

    /// Hash of the previous block.
    pub fn prev_block_hash(&self) -> Result<Sha256Hash> {
        Ok(self.header()?.prev_block_hash)
    }

    /// Sets the previous block hash.
    pub fn set_prev_block_hash(&mut self, hash: Sha256Hash) -> Result<()> {
        self.header_mut()?.prev_block_hash = hash;
        Ok(())
    }

    /// Merkle root stored in the header.
    pub fn merkle_root(&self) -> Result<Sha256Hash> {
        Ok(self.header()?.merkle_root)
    }

    /// Overwrites the stored merkle root.
    pub fn set_merkle_root(&mut self, root: Sha256Hash) -> Result<()> {
        self.header_mut()?.merkle_root = root;
        Ok(())
    }

    /// Timestamp in seconds.
    pub fn time(&self) -> Result<u32> {
        Ok(self.header()?.time)
    }

    /// Sets the timestamp.
    pub fn set_time(&mut self, time: u32) -> Result<()> {
        self.header_mut()?.time = time;
        Ok(())
    }

    /// Difficulty target in compact form.
    pub fn difficulty_target(&self) -> Result<u32> {
        Ok(self.header()?.difficulty_target)
    }

    /// Sets the compact difficulty target.
    pub fn set_difficulty_target(&mut self, bits: u32) -> Result<()> {
        self.header_mut()?.difficulty_target = bits;
        Ok(())
    }

    /// Proof-of-work nonce.
    pub fn nonce(&self) -> Result<u32> {
        Ok(self.header()?.nonce)
    }

    /// Sets the nonce.
    pub fn set_nonce(&mut self, nonce: u32) -> Result<()> {
        self.header_mut()?.nonce = nonce;
        Ok(())
    }

    /// True if the block carries no body.
    pub fn is_header_only(&self) -> bool {
        self.body.is_none()
    }

    fn body(&self) -> Result<&BlockBody> {
        self.body.as_ref().ok_or(CodecError::HeaderOnly)?.fields()
    }

    fn body_mut(&mut self) -> Result<&mut BlockBody> {
        self.raw = None;
        self.body.as_mut().ok_or(CodecError::HeaderOnly)?.fields_mut()
    }

    /// The transactions, in order. Fails on a header-only block.
    pub fn transactions(&self) -> Result<&[Transaction]> {
        Ok(&self.body()?.transactions)
    }

    /// Mutable access to one transaction. The body goes stale; the header
    /// and the other transactions keep their cached bytes.
    pub fn transaction_mut(&mut self, index: usize) -> Result<&mut Transaction> {
        let transactions = &mut self.body_mut()?.transactions;
        let len = transactions.len();
        transactions
            .get_mut(index)
            .ok_or(CodecError::IndexOutOfBounds { index, len })
    }

    /// Appends a transaction, giving a header-only block an empty body first.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        if self.body.is_none() {
            let body = BlockBody {
                transactions: Vec::new(),
                signature: Bytes::new(),
            };
            self.body = Some(Node::from_fields(body, self.header.config()));
        }
        self.body_mut()?.transactions.push(tx);
        Ok(())
    }

    /// Detaches and returns a transaction.
    pub fn remove_transaction(&mut self, index: usize) -> Result<Transaction> {
        let transactions = &mut self.body_mut()?.transactions;
        if index >= transactions.len() {
            return Err(CodecError::IndexOutOfBounds {
                index,
                len: transactions.len(),
            });
        }
        Ok(transactions.remove(index))
    }

    /// The block signature that follows the transactions.
    pub fn signature(&self) -> Result<Bytes> {
        Ok(self.body()?.signature.clone())
    }

    /// Replaces the block signature.
    pub fn set_signature(&mut self, signature: impl Into<Bytes>) -> Result<()> {
        self.body_mut()?.signature = signature.into();
        Ok(())
    }

    /// Merkle root over the current transaction hashes.
    pub fn compute_merkle_root(&self) -> Result<Sha256Hash> {
        let hashes = self
            .transactions()?
            .iter()
            .map(Transaction::hash)
            .collect::<Result<Vec<_>>>()?;
        Ok(merkle_root(&hashes))
    }

    /// True once the header fields are materialized.
    pub fn is_header_parsed(&self) -> bool {
        self.header.is_parsed()
    }

    /// True while the header bytes match the header fields.
    pub fn is_header_cached(&self) -> bool {
        self.header.is_cached()
    }

    /// True if the body is parsed, or there is no body.
    pub fn is_transactions_parsed(&self) -> bool {
        self.body.as_ref().map_or(true, Node::is_parsed)
    }

    /// True while the body bytes match the transaction list, or there is
    /// no body.
    pub fn is_transactions_cached(&self) -> bool {
        self.body.as_ref().map_or(true, Node::is_cached)
    }
}

impl Message for Block {
    fn length(&self) -> usize {
        self.header.length() + self.body.as_ref().map_or(0, Node::length)
    }

    fn is_parsed(&self) -> bool {
        self.is_header_parsed() && self.is_transactions_parsed()
    }

    fn is_cached(&self) -> bool {
        self.is_header_cached() && self.is_transactions_cached()
    }

    fn ensure_parsed(&self) -> Result<()> {
        self.header.fields()?;
        if let Some(body) = &self.body {
            body.fields()?;
        }
        Ok(())
    }

    fn invalidate(&mut self) -> Result<()> {
        self.raw = None;
        self.header.invalidate()?;
        if let Some(body) = &mut self.body {
            body.invalidate()?;
        }
        Ok(())
    }

    fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()> {
        if let Some(raw) = &self.raw {
            out.extend_from_slice(raw);
            return Ok(());
        }
        self.header.serialize_into(out)?;
        if let Some(body) = &self.body {
            body.serialize_into(out)?;
        }
        Ok(())
    }

    fn serialize(&mut self) -> Result<Bytes> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }
        let bytes = Bytes::from(self.to_bytes()?);
        let split = self.header.length();
        if self.header.config().retain && !self.header.is_cached() {
            self.header.recache(bytes.slice(..split));
        }
        if let Some(body) = &mut self.body {
            if body.config().retain && !body.is_cached() {
                body.recache(bytes.slice(split..));
            }
        }
        if self.is_cached() {
            self.raw = Some(bytes.clone());
        }
        Ok(bytes)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body == other.body
    }
}
