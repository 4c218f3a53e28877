//! Frame codec: the envelope around every message on the wire.
//!
//! ```text
//! magic:4 | command:12 (ASCII, NUL-padded) | length:u32 LE | [checksum:4] | payload
//! ```
//!
//! The checksum field is only present when the serializer is configured
//! for it. Payloads are handed to the parser registered for their command;
//! commands nobody registered become [`NetworkMessage::Unknown`].

use std::collections::HashMap;

use bytes::Bytes;
use log::{debug, trace, warn};
use paycoin_core::serialization::ByteReader;
use paycoin_core::{double_sha256, CodecError, ParseConfig, Result};
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};
use crate::protocol::message::{default_parsers, NetworkMessage, PayloadParser, UnknownMessage};
use crate::protocol::{Network, NetworkParams};

/// Width of the command field.
pub const COMMAND_SIZE: usize = 12;

/// First four bytes of the double SHA-256 of `payload`.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let hash = double_sha256(payload);
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash.as_bytes()[..4]);
    out
}

/// Frame header that follows the magic bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Command name (NUL-padded)
    pub command: [u8; COMMAND_SIZE],
    /// Payload length
    pub length: u32,
    /// Payload checksum, when the envelope carries one
    pub checksum: Option<[u8; 4]>,
}

impl PacketHeader {
    /// Header for `payload` sent as `command`.
    pub fn new(command: &str, payload: &[u8], with_checksum: bool) -> Result<Self> {
        if command.len() > COMMAND_SIZE || !command.is_ascii() {
            return Err(CodecError::violation(format!("invalid command name {:?}", command)));
        }
        let length = u32::try_from(payload.len())
            .map_err(|_| CodecError::violation(format!("payload of {} bytes", payload.len())))?;

        let mut command_bytes = [0u8; COMMAND_SIZE];
        command_bytes[..command.len()].copy_from_slice(command.as_bytes());

        Ok(Self {
            command: command_bytes,
            length,
            checksum: with_checksum.then(|| checksum(payload)),
        })
    }

    /// Reads a header. A length above `max_size` is rejected before
    /// anything past the length field is consumed.
    pub fn read(reader: &mut ByteReader, max_size: u32, with_checksum: bool) -> Result<Self> {
        let command = reader.read_fixed::<COMMAND_SIZE>()?;
        let length = reader.read_u32_le()?;
        if length > max_size {
            return Err(CodecError::violation(format!(
                "message size too large: {} bytes (max: {} bytes)",
                length, max_size
            )));
        }
        let checksum = if with_checksum {
            Some(reader.read_fixed::<4>()?)
        } else {
            None
        };
        Ok(Self {
            command,
            length,
            checksum,
        })
    }

    /// Appends the encoding to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.command);
        out.extend_from_slice(&self.length.to_le_bytes());
        if let Some(checksum) = &self.checksum {
            out.extend_from_slice(checksum);
        }
    }

    /// Encoded size
    pub fn encoded_len(&self) -> usize {
        COMMAND_SIZE + 4 + if self.checksum.is_some() { 4 } else { 0 }
    }

    /// Get the command as a string
    pub fn command_str(&self) -> Result<&str> {
        let end = self
            .command
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.command.len());
        std::str::from_utf8(&self.command[..end])
            .map_err(|e| CodecError::violation(format!("invalid command: {}", e)))
    }

    /// Verify the checksum of a payload. Always true without a checksum.
    pub fn verify_checksum(&self, payload: &[u8]) -> bool {
        self.checksum.map_or(true, |expected| expected == checksum(payload))
    }
}

/// Serializer settings, loadable from TOML.
///
/// ```toml
/// network = "peercoin"
/// checksum = true
///
/// [parse]
/// lazy = true
/// retain = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Network whose parameters frame the messages
    pub network: Network,
    /// How payloads are parsed
    pub parse: ParseConfig,
    /// Whether envelopes carry a checksum
    pub checksum: bool,
}

impl SerializerConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(s: &str) -> NetworkResult<Self> {
        toml::from_str(s).map_err(|e| NetworkError::Config(e.to_string()))
    }
}

/// Reads and writes framed messages for one network.
#[derive(Debug, Clone)]
pub struct Serializer {
    params: NetworkParams,
    parse: ParseConfig,
    checksum: bool,
    parsers: HashMap<String, PayloadParser>,
}

impl Serializer {
    /// Eager parsing, no checksum.
    pub fn new(params: NetworkParams) -> Self {
        Self {
            params,
            parse: ParseConfig::default(),
            checksum: false,
            parsers: default_parsers()
                .into_iter()
                .map(|(command, parser)| (command.to_string(), parser))
                .collect(),
        }
    }

    /// A serializer set up from `config`.
    pub fn from_config(config: &SerializerConfig) -> Self {
        Self::new(config.network.params())
            .with_parse_config(config.parse)
            .with_checksum(config.checksum)
    }

    /// Sets how payloads are parsed.
    pub fn with_parse_config(mut self, parse: ParseConfig) -> Self {
        self.parse = parse;
        self
    }

    /// Turns the envelope checksum on or off.
    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// Network this serializer frames for.
    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// How payloads are parsed.
    pub fn parse_config(&self) -> ParseConfig {
        self.parse
    }

    /// True if frames carry a checksum.
    pub fn checksum_enabled(&self) -> bool {
        self.checksum
    }

    /// Magic plus header bytes in front of every payload.
    pub fn frame_overhead(&self) -> usize {
        4 + COMMAND_SIZE + 4 + if self.checksum { 4 } else { 0 }
    }

    /// Adds or replaces the parser for `command`, returning the old one.
    pub fn register(&mut self, command: impl Into<String>, parser: PayloadParser) -> Option<PayloadParser> {
        self.parsers.insert(command.into(), parser)
    }

    /// Advances `reader` just past the next occurrence of the magic bytes.
    ///
    /// Fails with [`CodecError::ResyncFailure`] when the bytes run out
    /// first; the skipped bytes are consumed either way.
    pub fn seek_past_magic_bytes(&self, reader: &mut ByteReader) -> Result<()> {
        match self.find_magic(reader.rest()) {
            Some(pos) => {
                if pos > 0 {
                    debug!("skipped {} bytes looking for magic bytes", pos);
                }
                reader.skip(pos + self.params.magic.len())
            }
            None => {
                debug!("no magic bytes in {} bytes of input", reader.remaining());
                reader.skip(reader.remaining())?;
                Err(CodecError::ResyncFailure)
            }
        }
    }

    /// Offset of the first complete magic in `buf`.
    pub fn find_magic(&self, buf: &[u8]) -> Option<usize> {
        let magic = self.params.magic;
        buf.windows(magic.len()).position(|window| window == magic)
    }

    /// Reads the header that follows the magic bytes.
    pub fn read_header(&self, reader: &mut ByteReader) -> Result<PacketHeader> {
        PacketHeader::read(reader, self.params.max_message_size, self.checksum)
    }

    /// Reads one whole frame and decodes its payload.
    pub fn deserialize(&self, reader: &mut ByteReader) -> Result<NetworkMessage> {
        self.seek_past_magic_bytes(reader)?;
        let header = self.read_header(reader)?;
        let payload = reader.read_bytes(header.length as usize)?;
        self.deserialize_payload(&header, payload)
    }

    /// Decodes a payload whose header has already been read.
    pub fn deserialize_payload(&self, header: &PacketHeader, payload: Bytes) -> Result<NetworkMessage> {
        let command = header.command_str()?;
        if !header.verify_checksum(&payload) {
            warn!("checksum mismatch on {} message of {} bytes", command, payload.len());
            return Err(CodecError::violation(format!("checksum mismatch on {}", command)));
        }
        trace!("received {} message of {} bytes", command, payload.len());

        match self.parsers.get(command) {
            Some(parser) => parser(payload, self.parse),
            None => {
                debug!("no parser for command {:?}, keeping {} raw bytes", command, payload.len());
                Ok(NetworkMessage::Unknown(UnknownMessage {
                    command: command.to_string(),
                    payload,
                }))
            }
        }
    }

    /// Writes a whole frame for `message` to `out`.
    ///
    /// Nothing is written if the payload cannot be produced.
    pub fn serialize(&self, message: &mut NetworkMessage, out: &mut Vec<u8>) -> Result<()> {
        let payload = message.payload()?;
        self.serialize_raw(message.command(), &payload, out)
    }

    /// Writes a frame around an already encoded payload.
    pub fn serialize_raw(&self, command: &str, payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
        if payload.len() > self.params.max_message_size as usize {
            return Err(CodecError::violation(format!(
                "message size too large: {} bytes (max: {} bytes)",
                payload.len(),
                self.params.max_message_size
            )));
        }
        let header = PacketHeader::new(command, payload, self.checksum)?;
        out.reserve(4 + header.encoded_len() + payload.len());
        out.extend_from_slice(&self.params.magic);
        header.write(out);
        out.extend_from_slice(payload);
        trace!("sending {} message of {} bytes", command, payload.len());
        Ok(())
    }
}
