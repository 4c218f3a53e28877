use bytes::Bytes;

use crate::crypto::Sha256Hash;
use crate::error::{CodecError, Result};
use crate::message::{impl_message, recache_children, Fields, Node, ParseConfig};
use crate::serialization::{varint_size, write_varint, ByteReader};
use crate::types::input::{InputFields, MIN_INPUT_SIZE};
use crate::types::output::{OutputFields, MIN_OUTPUT_SIZE};
use crate::types::{TransactionInput, TransactionOutput};

/// Version written by [`Transaction::new`].
pub const CURRENT_VERSION: u32 = 1;

/// Smallest possible encoding: version, time, two empty lists, lock time.
pub(crate) const MIN_TRANSACTION_SIZE: usize = 4 + 4 + 1 + 1 + 4;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TransactionFields {
    version: u32,
    time: u32,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
    lock_time: u32,
}

impl Fields for TransactionFields {
    fn scan(reader: &mut ByteReader) -> Result<()> {
        reader.skip(8)?;
        for _ in 0..reader.read_count(MIN_INPUT_SIZE, "input")? {
            InputFields::scan(reader)?;
        }
        for _ in 0..reader.read_count(MIN_OUTPUT_SIZE, "output")? {
            OutputFields::scan(reader)?;
        }
        reader.skip(4)
    }

    fn parse(reader: &mut ByteReader, config: ParseConfig) -> Result<Self> {
        let version = reader.read_u32_le()?;
        let time = reader.read_u32_le()?;
        let inputs = (0..reader.read_count(MIN_INPUT_SIZE, "input")?)
            .map(|_| TransactionInput::read(reader, config))
            .collect::<Result<Vec<_>>>()?;
        let outputs = (0..reader.read_count(MIN_OUTPUT_SIZE, "output")?)
            .map(|_| TransactionOutput::read(reader, config))
            .collect::<Result<Vec<_>>>()?;
        let lock_time = reader.read_u32_le()?;
        Ok(Self {
            version,
            time,
            inputs,
            outputs,
            lock_time,
        })
    }

    fn encoded_len(&self) -> usize {
        8 + varint_size(self.inputs.len() as u64)
            + self.inputs.iter().map(|i| i.node.length()).sum::<usize>()
            + varint_size(self.outputs.len() as u64)
            + self.outputs.iter().map(|o| o.node.length()).sum::<usize>()
            + 4
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        write_varint(out, self.inputs.len() as u64);
        for input in &self.inputs {
            input.node.serialize_into(out)?;
        }
        write_varint(out, self.outputs.len() as u64);
        for output in &self.outputs {
            output.node.serialize_into(out)?;
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        Ok(())
    }

    fn recache(&mut self, raw: &Bytes) {
        let offset = 8 + varint_size(self.inputs.len() as u64);
        let offset = recache_children(self.inputs.iter_mut().map(|i| &mut i.node), raw, offset);
        let offset = offset + varint_size(self.outputs.len() as u64);
        recache_children(self.outputs.iter_mut().map(|o| &mut o.node), raw, offset);
    }
}

/// A transaction of the Peercoin family.
///
/// Unlike Bitcoin, the encoding carries a timestamp right after the
/// version:
///
/// ```text
/// version:u32 | time:u32 | vin:varint | inputs | vout:varint | outputs | lock_time:u32
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub(crate) node: Node<TransactionFields>,
}

impl_message!(Transaction);

fn child_mut<T>(list: &mut [T], index: usize) -> Result<&mut T> {
    let len = list.len();
    list.get_mut(index)
        .ok_or(CodecError::IndexOutOfBounds { index, len })
}

fn remove_child<T>(list: &mut Vec<T>, index: usize) -> Result<T> {
    if index >= list.len() {
        return Err(CodecError::IndexOutOfBounds { index, len: list.len() });
    }
    Ok(list.remove(index))
}

impl Transaction {
    /// An empty transaction stamped with `time`.
    pub fn new(time: u32) -> Self {
        let fields = TransactionFields {
            version: CURRENT_VERSION,
            time,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        };
        Self {
            node: Node::from_fields(fields, ParseConfig::default()),
        }
    }

    /// Decodes a transaction from the start of `bytes`.
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

    pub(crate) fn scan(reader: &mut ByteReader) -> Result<()> {
        TransactionFields::scan(reader)
    }

    /// The transaction id: double SHA-256 of the encoding.
    pub fn hash(&self) -> Result<Sha256Hash> {
        self.node.digest()
    }

    /// Version field.
    pub fn version(&self) -> Result<u32> {
        Ok(self.node.fields()?.version)
    }

    /// Sets the version.
    pub fn set_version(&mut self, version: u32) -> Result<()> {
        self.node.fields_mut()?.version = version;
        Ok(())
    }

    /// The coin-family timestamp carried by every transaction.
    pub fn time(&self) -> Result<u32> {
        Ok(self.node.fields()?.time)
    }

    /// Sets the timestamp.
    pub fn set_time(&mut self, time: u32) -> Result<()> {
        self.node.fields_mut()?.time = time;
        Ok(())
    }

    /// Lock time.
    pub fn lock_time(&self) -> Result<u32> {
        Ok(self.node.fields()?.lock_time)
    }

    /// Sets the lock time.
    pub fn set_lock_time(&mut self, lock_time: u32) -> Result<()> {
        self.node.fields_mut()?.lock_time = lock_time;
        Ok(())
    }

    /// The inputs, in order. Under lazy parsing each one is still unparsed.
    pub fn inputs(&self) -> Result<&[TransactionInput]> {
        Ok(&self.node.fields()?.inputs)
    }

    /// The outputs, in order.
    pub fn outputs(&self) -> Result<&[TransactionOutput]> {
        Ok(&self.node.fields()?.outputs)
    }

    /// Mutable access to one input. The transaction is stale from here on;
    /// the other inputs and outputs keep their cached bytes.
    pub fn input_mut(&mut self, index: usize) -> Result<&mut TransactionInput> {
        child_mut(&mut self.node.fields_mut()?.inputs, index)
    }

    /// Mutable access to one output. See [`Transaction::input_mut`].
    pub fn output_mut(&mut self, index: usize) -> Result<&mut TransactionOutput> {
        child_mut(&mut self.node.fields_mut()?.outputs, index)
    }

    /// Appends an input. The input keeps whatever cached bytes it has.
    pub fn add_input(&mut self, input: TransactionInput) -> Result<()> {
        self.node.fields_mut()?.inputs.push(input);
        Ok(())
    }

    /// Detaches and returns an input.
    pub fn remove_input(&mut self, index: usize) -> Result<TransactionInput> {
        remove_child(&mut self.node.fields_mut()?.inputs, index)
    }

    /// Removes every input.
    pub fn clear_inputs(&mut self) -> Result<()> {
        self.node.fields_mut()?.inputs.clear();
        Ok(())
    }

    /// Appends an output.
    pub fn add_output(&mut self, output: TransactionOutput) -> Result<()> {
        self.node.fields_mut()?.outputs.push(output);
        Ok(())
    }

    /// Detaches and returns an output.
    pub fn remove_output(&mut self, index: usize) -> Result<TransactionOutput> {
        remove_child(&mut self.node.fields_mut()?.outputs, index)
    }

    /// Removes every output.
    pub fn clear_outputs(&mut self) -> Result<()> {
        self.node.fields_mut()?.outputs.clear();
        Ok(())
    }

    /// True if the only input spends the null outpoint.
    pub fn is_coinbase(&self) -> Result<bool> {
        match self.inputs()? {
            [input] => input.is_coinbase(),
            _ => Ok(false),
        }
    }

    /// Sum of the output values.
    pub fn output_value(&self) -> Result<i64> {
        let mut total = 0i64;
        for output in self.outputs()? {
            total = total.saturating_add(output.value()?);
        }
        Ok(total)
    }
}
