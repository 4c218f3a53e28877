use bytes::Bytes;

use crate::error::Result;
use crate::message::{impl_message, Fields, Node, ParseConfig};
use crate::serialization::{var_bytes_size, write_var_bytes, ByteReader};
use crate::types::OutPoint;

/// Sequence number meaning "final".
pub const NO_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Smallest possible encoding: outpoint, empty script, sequence.
pub(crate) const MIN_INPUT_SIZE: usize = OutPoint::SIZE + 1 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InputFields {
    outpoint: OutPoint,
    script_sig: Bytes,
    sequence: u32,
}

impl Fields for InputFields {
    fn scan(reader: &mut ByteReader) -> Result<()> {
        reader.skip(OutPoint::SIZE)?;
        reader.skip_var_bytes()?;
        reader.skip(4)
    }

    fn parse(reader: &mut ByteReader, _config: ParseConfig) -> Result<Self> {
        Ok(Self {
            outpoint: OutPoint::read(reader)?,
            script_sig: reader.read_var_bytes()?,
            sequence: reader.read_u32_le()?,
        })
    }

    fn encoded_len(&self) -> usize {
        OutPoint::SIZE + var_bytes_size(self.script_sig.len()) + 4
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        self.outpoint.write(out);
        write_var_bytes(out, &self.script_sig);
        out.extend_from_slice(&self.sequence.to_le_bytes());
        Ok(())
    }
}

/// A transaction input: the output it spends, the script that unlocks it,
/// and a sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionInput {
    pub(crate) node: Node<InputFields>,
}

impl_message!(TransactionInput);

impl TransactionInput {
    /// Creates an input spending `outpoint` with a final sequence number.
    pub fn new(outpoint: OutPoint, script_sig: impl Into<Bytes>) -> Self {
        let fields = InputFields {
            outpoint,
            script_sig: script_sig.into(),
            sequence: NO_SEQUENCE,
        };
        Self {
            node: Node::from_fields(fields, ParseConfig::default()),
        }
    }

    /// Creates the single input of a coinbase transaction.
    pub fn coinbase(script_sig: impl Into<Bytes>) -> Self {
        Self::new(OutPoint::null(), script_sig)
    }

    /// Decodes an input from the start of `bytes`.
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

    /// The output being spent.
    pub fn outpoint(&self) -> Result<OutPoint> {
        Ok(self.node.fields()?.outpoint)
    }

    /// Points the input at another output.
    pub fn set_outpoint(&mut self, outpoint: OutPoint) -> Result<()> {
        self.node.fields_mut()?.outpoint = outpoint;
        Ok(())
    }

    /// The unlocking script. Shares the buffer the input was decoded from.
    pub fn script_sig(&self) -> Result<Bytes> {
        Ok(self.node.fields()?.script_sig.clone())
    }

    /// Replaces the unlocking script.
    pub fn set_script_sig(&mut self, script_sig: impl Into<Bytes>) -> Result<()> {
        self.node.fields_mut()?.script_sig = script_sig.into();
        Ok(())
    }

    /// Sequence number.
    pub fn sequence_number(&self) -> Result<u32> {
        Ok(self.node.fields()?.sequence)
    }

    /// Sets the sequence number.
    pub fn set_sequence_number(&mut self, sequence: u32) -> Result<()> {
        self.node.fields_mut()?.sequence = sequence;
        Ok(())
    }

    /// True if the sequence number is not final.
    pub fn has_sequence(&self) -> Result<bool> {
        Ok(self.sequence_number()? != NO_SEQUENCE)
    }

    /// True if this input spends the null outpoint.
    pub fn is_coinbase(&self) -> Result<bool> {
        Ok(self.outpoint()?.is_null())
    }
}
