//! Lazy parsing and byte caching for wire structures.
//!
//! Every block, transaction, input and output is a [`Node`] over a slice of
//! the payload it arrived in. A node moves through two states:
//!
//! - *unparsed*: only the raw slice is held. Its length is known because a
//!   lite-parse scan walked the structure when the node was created.
//! - *parsed*: the fields have been materialized. The raw slice may still
//!   be held if it is byte-identical to the fields (the node is *cached*).
//!
//! Read accessors take `&self` and materialize fields on first use.
//! Mutation needs `&mut` access, and handing out `&mut` access to fields or
//! to a child marks the node stale. Because a child is only reachable
//! mutably through its parent, every ancestor on the path to a mutated node
//! has already been marked stale, while siblings keep their cached bytes.
//!
//! Nodes are not `Sync`: first-access parsing writes through `&self`.

use std::cell::OnceCell;

use bytes::Bytes;
use log::trace;
use serde::{Deserialize, Serialize};

use crate::crypto::{double_sha256, Sha256Hash};
use crate::error::{CodecError, Result};
use crate::serialization::ByteReader;

/// How a payload is turned into nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Defer materializing fields until they are first read.
    pub lazy: bool,
    /// Keep the original bytes so unmodified nodes re-serialize by copy.
    pub retain: bool,
}

impl ParseConfig {
    /// Parse everything up front and drop the input bytes.
    pub const EAGER: ParseConfig = ParseConfig { lazy: false, retain: false };
    /// Parse everything up front and keep the input bytes.
    pub const EAGER_RETAIN: ParseConfig = ParseConfig { lazy: false, retain: true };
    /// Parse on first access; re-encode on serialize.
    pub const LAZY: ParseConfig = ParseConfig { lazy: true, retain: false };
    /// Parse on first access and keep the input bytes.
    pub const LAZY_RETAIN: ParseConfig = ParseConfig { lazy: true, retain: true };

    /// All four combinations.
    pub const ALL: [ParseConfig; 4] = [
        ParseConfig::EAGER,
        ParseConfig::EAGER_RETAIN,
        ParseConfig::LAZY,
        ParseConfig::LAZY_RETAIN,
    ];

    /// Creates a configuration.
    pub const fn new(lazy: bool, retain: bool) -> Self {
        Self { lazy, retain }
    }
}

/// Operations every wire structure supports.
pub trait Message {
    /// Encoded size in bytes. Never forces a full parse.
    fn length(&self) -> usize;

    /// True once the fields have been materialized.
    fn is_parsed(&self) -> bool;

    /// True while the held bytes are byte-identical to the fields.
    fn is_cached(&self) -> bool;

    /// Materializes the fields if they are not already.
    fn ensure_parsed(&self) -> Result<()>;

    /// Drops the held bytes so the next serialize re-encodes from fields.
    fn invalidate(&mut self) -> Result<()>;

    /// Appends the encoding to `out`. Cached bytes are copied verbatim.
    fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Encodes the value. With `retain` configured the result is kept and
    /// shared with every descendant, so the whole tree is cached again.
    fn serialize(&mut self) -> Result<Bytes>;

    /// Encodes into a fresh vector without touching the cache.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.length());
        self.serialize_into(&mut out)?;
        Ok(out)
    }
}

/// Field set of a node: how to scan, parse and encode it.
pub(crate) trait Fields: Sized {
    /// Lite-parse: advance over one encoded value, validating structure.
    fn scan(reader: &mut ByteReader) -> Result<()>;

    /// Materializes one encoded value. Children use the same `config`.
    fn parse(reader: &mut ByteReader, config: ParseConfig) -> Result<Self>;

    fn encoded_len(&self) -> usize;

    fn encode(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Hands each child its slice of `raw`, a fresh encoding of `self`.
    fn recache(&mut self, _raw: &Bytes) {}
}

/// Raw bytes plus lazily materialized fields.
#[derive(Debug, Clone)]
pub(crate) struct Node<F> {
    raw: Option<Bytes>,
    cached: bool,
    config: ParseConfig,
    fields: OnceCell<F>,
    digest: OnceCell<Sha256Hash>,
}

impl<F: Fields> Node<F> {
    /// Reads one node at the reader's cursor.
    pub fn read(reader: &mut ByteReader, config: ParseConfig) -> Result<Self> {
        let start = reader.position();
        let fields = if config.lazy {
            F::scan(reader)?;
            OnceCell::new()
        } else {
            OnceCell::from(F::parse(reader, config)?)
        };
        // Unparsed nodes always keep their slice; it is the only copy.
        let raw = (config.lazy || config.retain).then(|| reader.slice_from(start));
        Ok(Self {
            raw,
            cached: config.retain,
            config,
            fields,
            digest: OnceCell::new(),
        })
    }

    /// Reads a node spanning the start of `bytes`.
    pub fn from_bytes(bytes: Bytes, config: ParseConfig) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let node = Self::read(&mut reader, config)?;
        if !reader.is_empty() {
            trace!("ignoring {} trailing bytes after message", reader.remaining());
        }
        Ok(node)
    }

    /// A detached node built from field values.
    pub fn from_fields(fields: F, config: ParseConfig) -> Self {
        Self {
            raw: None,
            cached: false,
            config,
            fields: OnceCell::from(fields),
            digest: OnceCell::new(),
        }
    }

    /// Configuration the node was read with.
    pub fn config(&self) -> ParseConfig {
        self.config
    }

    /// True once the fields are materialized.
    pub fn is_parsed(&self) -> bool {
        self.fields.get().is_some()
    }

    /// True while the held bytes match the fields.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Bytes that match the current fields, if held.
    fn current_bytes(&self) -> Option<&Bytes> {
        if self.cached || !self.is_parsed() {
            self.raw.as_ref()
        } else {
            None
        }
    }

    /// Materialized fields, parsing on first access.
    pub fn fields(&self) -> Result<&F> {
        if let Some(fields) = self.fields.get() {
            return Ok(fields);
        }
        let raw = self
            .raw
            .clone()
            .ok_or_else(|| CodecError::violation("unparsed node holds no bytes"))?;
        trace!("materializing {} byte node", raw.len());
        let parsed = F::parse(&mut ByteReader::new(raw), self.config)?;
        Ok(self.fields.get_or_init(|| parsed))
    }

    /// Mutable fields. The node is stale from here on.
    pub fn fields_mut(&mut self) -> Result<&mut F> {
        self.fields()?;
        self.mark_stale();
        self.fields
            .get_mut()
            .ok_or_else(|| CodecError::violation("node fields missing after parse"))
    }

    /// Parses, then drops the held bytes.
    pub fn invalidate(&mut self) -> Result<()> {
        self.fields()?;
        self.mark_stale();
        Ok(())
    }

    // Only valid once parsed: the raw slice is dropped.
    fn mark_stale(&mut self) {
        self.digest.take();
        if !self.cached && self.raw.is_none() {
            return;
        }
        self.cached = false;
        self.raw = None;
    }

    /// Encoded size, from the held bytes when possible.
    pub fn length(&self) -> usize {
        match (self.current_bytes(), self.fields.get()) {
            (Some(raw), _) => raw.len(),
            (None, Some(fields)) => fields.encoded_len(),
            (None, None) => 0,
        }
    }

    /// Appends the encoding to `out`.
    pub fn serialize_into(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.cached {
            if let Some(raw) = &self.raw {
                out.extend_from_slice(raw);
                return Ok(());
            }
        }
        self.fields()?.encode(out)
    }

    /// Encodes the node, caching the result when `retain` is set.
    pub fn serialize(&mut self) -> Result<Bytes> {
        if self.cached {
            if let Some(raw) = &self.raw {
                return Ok(raw.clone());
            }
        }
        let mut out = Vec::with_capacity(self.length());
        self.fields()?.encode(&mut out)?;
        let bytes = Bytes::from(out);
        if self.config.retain {
            self.recache(bytes.clone());
        }
        Ok(bytes)
    }

    /// Adopts `raw` as the cached encoding of this subtree.
    pub fn recache(&mut self, raw: Bytes) {
        if let Some(fields) = self.fields.get_mut() {
            fields.recache(&raw);
        }
        self.raw = Some(raw);
        self.cached = true;
    }

    /// Double SHA-256 of the encoding, memoized until the node goes stale.
    pub fn digest(&self) -> Result<Sha256Hash> {
        if let Some(hash) = self.digest.get() {
            return Ok(*hash);
        }
        let hash = match self.current_bytes() {
            Some(raw) => double_sha256(raw),
            None => {
                let mut out = Vec::with_capacity(self.length());
                self.fields()?.encode(&mut out)?;
                double_sha256(&out)
            }
        };
        Ok(*self.digest.get_or_init(|| hash))
    }
}

impl<F: Fields + PartialEq> PartialEq for Node<F> {
    fn eq(&self, other: &Self) -> bool {
        match (self.fields(), other.fields()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Re-slices a fresh parent encoding into a list of children, starting at
/// `offset`. Returns the offset just past the last child.
pub(crate) fn recache_children<'a, F: Fields + 'a>(
    children: impl IntoIterator<Item = &'a mut Node<F>>,
    raw: &Bytes,
    offset: usize,
) -> usize {
    let mut offset = offset;
    for child in children {
        let len = child.length();
        child.recache(raw.slice(offset..offset + len));
        offset += len;
    }
    offset
}

/// Implements [`Message`] for a newtype whose `node` field is a [`Node`].
macro_rules! impl_message {
    ($ty:ty) => {
        impl $crate::message::Message for $ty {
            fn length(&self) -> usize {
                self.node.length()
            }

            fn is_parsed(&self) -> bool {
                self.node.is_parsed()
            }

            fn is_cached(&self) -> bool {
                self.node.is_cached()
            }

            fn ensure_parsed(&self) -> $crate::error::Result<()> {
                self.node.fields().map(|_| ())
            }

            fn invalidate(&mut self) -> $crate::error::Result<()> {
                self.node.invalidate()
            }

            fn serialize_into(&self, out: &mut Vec<u8>) -> $crate::error::Result<()> {
                self.node.serialize_into(out)
            }

            fn serialize(&mut self) -> $crate::error::Result<bytes::Bytes> {
                self.node.serialize()
            }
        }
    };
}

pub(crate) use impl_message;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::write_var_bytes;

    /// A two-field test node: a u32 and a byte string.
    #[derive(Debug, Clone, PartialEq)]
    struct Pair {
        tag: u32,
        data: Bytes,
    }

    impl Fields for Pair {
        fn scan(reader: &mut ByteReader) -> Result<()> {
            reader.skip(4)?;
            reader.skip_var_bytes()
        }

        fn parse(reader: &mut ByteReader, _config: ParseConfig) -> Result<Self> {
            Ok(Pair {
                tag: reader.read_u32_le()?,
                data: reader.read_var_bytes()?,
            })
        }

        fn encoded_len(&self) -> usize {
            4 + crate::serialization::var_bytes_size(self.data.len())
        }

        fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
            out.extend_from_slice(&self.tag.to_le_bytes());
            write_var_bytes(out, &self.data);
            Ok(())
        }
    }

    fn encoded() -> Bytes {
        Bytes::from_static(&[7, 0, 0, 0, 2, 0xab, 0xcd])
    }

    #[test]
    fn test_config_table_on_construction() {
        for config in ParseConfig::ALL {
            let node = Node::<Pair>::from_bytes(encoded(), config).unwrap();
            assert_eq!(node.is_parsed(), !config.lazy, "{:?}", config);
            assert_eq!(node.is_cached(), config.retain, "{:?}", config);
            assert_eq!(node.length(), 7);
        }
    }

    #[test]
    fn test_first_access_keeps_cache() {
        let node = Node::<Pair>::from_bytes(encoded(), ParseConfig::LAZY_RETAIN).unwrap();
        assert_eq!(node.fields().unwrap().tag, 7);
        assert!(node.is_parsed());
        assert!(node.is_cached());
    }

    #[test]
    fn test_mutation_marks_stale_and_serialize_recaches() {
        let mut node = Node::<Pair>::from_bytes(encoded(), ParseConfig::LAZY_RETAIN).unwrap();
        node.fields_mut().unwrap().data = Bytes::from_static(&[1, 2, 3]);
        assert!(!node.is_cached());
        assert_eq!(node.length(), 8);

        let bytes = node.serialize().unwrap();
        assert_eq!(&bytes[..], &[7, 0, 0, 0, 3, 1, 2, 3]);
        assert!(node.is_cached());
        assert_eq!(node.serialize().unwrap().as_ptr(), bytes.as_ptr());
    }

    #[test]
    fn test_serialize_without_retain_stays_uncached() {
        let mut node = Node::<Pair>::from_bytes(encoded(), ParseConfig::LAZY).unwrap();
        assert_eq!(node.serialize().unwrap(), encoded());
        assert!(node.is_parsed());
        assert!(!node.is_cached());
    }

    #[test]
    fn test_digest_reset_on_mutation() {
        let mut node = Node::<Pair>::from_bytes(encoded(), ParseConfig::EAGER_RETAIN).unwrap();
        let before = node.digest().unwrap();
        assert_eq!(before, double_sha256(&encoded()));
        node.fields_mut().unwrap().tag = 8;
        assert_ne!(node.digest().unwrap(), before);
    }

    #[test]
    fn test_equality_ignores_config() {
        let a = Node::<Pair>::from_bytes(encoded(), ParseConfig::LAZY).unwrap();
        let b = Node::<Pair>::from_bytes(encoded(), ParseConfig::EAGER_RETAIN).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncated_input_fails() {
        for config in ParseConfig::ALL {
            let err = Node::<Pair>::from_bytes(encoded().slice(..6), config).unwrap_err();
            assert!(matches!(err, CodecError::BufferUnderrun { .. }));
        }
    }
}
