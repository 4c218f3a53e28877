use bytes::Bytes;
use log::debug;

use crate::bag::TransactionBag;
use crate::error::Result;
use crate::message::{impl_message, Fields, Node, ParseConfig};
use crate::script::ScriptPattern;
use crate::serialization::{var_bytes_size, write_var_bytes, ByteReader};

/// Smallest possible encoding: value and an empty script.
pub(crate) const MIN_OUTPUT_SIZE: usize = 8 + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputFields {
    value: i64,
    script_pubkey: Bytes,
}

impl Fields for OutputFields {
    fn scan(reader: &mut ByteReader) -> Result<()> {
        reader.skip(8)?;
        reader.skip_var_bytes()
    }

    fn parse(reader: &mut ByteReader, _config: ParseConfig) -> Result<Self> {
        Ok(Self {
            value: reader.read_i64_le()?,
            script_pubkey: reader.read_var_bytes()?,
        })
    }

    fn encoded_len(&self) -> usize {
        8 + var_bytes_size(self.script_pubkey.len())
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(out, &self.script_pubkey);
        Ok(())
    }
}

/// A transaction output: an amount and the script that locks it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutput {
    pub(crate) node: Node<OutputFields>,
}

impl_message!(TransactionOutput);

impl TransactionOutput {
    /// Creates an output paying `value` base units to `script_pubkey`.
    pub fn new(value: i64, script_pubkey: impl Into<Bytes>) -> Self {
        let fields = OutputFields {
            value,
            script_pubkey: script_pubkey.into(),
        };
        Self {
            node: Node::from_fields(fields, ParseConfig::default()),
        }
    }

    /// Decodes an output from the start of `bytes`.
    pub fn from_bytes(bytes: impl Into<Bytes>, config: ParseConfig) -> Result<Self> {
        Ok(Self {
            node: Node::from_bytes(bytes.into(), config)?,
        })
    }

    pub(crate) fn read(reader: &mut ByteReader, config: ParseConfig) -> Result<Self> {
        Ok(Self {
            node: Node::read(reader, config)?,
        })
    }

    /// Amount in base units.
    pub fn value(&self) -> Result<i64> {
        Ok(self.node.fields()?.value)
    }

    /// Sets the value in satoshis.
    pub fn set_value(&mut self, value: i64) -> Result<()> {
        self.node.fields_mut()?.value = value;
        Ok(())
    }

    /// The locking script.
    pub fn script_pubkey(&self) -> Result<Bytes> {
        Ok(self.node.fields()?.script_pubkey.clone())
    }

    /// Replaces the locking script.
    pub fn set_script_pubkey(&mut self, script: impl Into<Bytes>) -> Result<()> {
        self.node.fields_mut()?.script_pubkey = script.into();
        Ok(())
    }

    /// Whether `bag` holds the key that can spend this output.
    ///
    /// An output whose script cannot be read or does not match a standard
    /// template is never ours.
    pub fn is_mine(&self, bag: &dyn TransactionBag) -> bool {
        let script = match self.script_pubkey() {
            Ok(script) => script,
            Err(e) => {
                debug!("Could not parse tx output script: {}", e);
                return false;
            }
        };
        match ScriptPattern::classify(&script) {
            ScriptPattern::PayToPubKey(key) => bag.is_pub_key_mine(key),
            ScriptPattern::PayToScriptHash(hash) => bag.is_pay_to_script_hash_mine(hash),
            ScriptPattern::PayToPubKeyHash(hash) => bag.is_pub_key_hash_mine(hash),
            ScriptPattern::NonStandard => {
                debug!("Output script is not a standard template: {}", hex::encode(&script));
                false
            }
        }
    }

    /// Whether `bag` watches this output's script.
    pub fn is_watched(&self, bag: &dyn TransactionBag) -> bool {
        match self.script_pubkey() {
            Ok(script) => bag.is_watched_script(&script),
            Err(e) => {
                debug!("Could not parse tx output script: {}", e);
                false
            }
        }
    }

    /// Whether `bag` owns or watches this output.
    pub fn is_mine_or_watched(&self, bag: &dyn TransactionBag) -> bool {
        self.is_mine(bag) || self.is_watched(bag)
    }
}
