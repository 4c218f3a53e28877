//! Network message types and payload encoding

use bytes::Bytes;
use log::trace;
use paycoin_core::serialization::{write_var_bytes, write_varint, ByteReader};
use paycoin_core::{Block, CodecError, Message, ParseConfig, Result, Sha256Hash, Transaction};
use serde::{Deserialize, Serialize};

use crate::protocol::{current_timestamp, InventoryItem, NetworkParams, PeerAddress};

/// Most addresses one `addr` message may carry
pub const MAX_ADDRESSES: usize = 1024;

/// Most items one inventory message may carry
pub const MAX_INVENTORY_ITEMS: usize = 50_000;

/// Most headers one `headers` message may carry
pub const MAX_HEADERS: usize = 2000;

/// Most hashes a block locator may carry
pub const MAX_LOCATOR_HASHES: usize = 500;

/// Builds a message from a payload. One is registered per command.
pub type PayloadParser = fn(Bytes, ParseConfig) -> Result<NetworkMessage>;

/// Network message types
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkMessage {
    /// Version message (sent when a connection is established)
    Version(VersionMessage),
    /// Version acknowledgment (sent in response to version)
    Verack,
    /// Known peer addresses
    Addr(Vec<PeerAddress>),
    /// Announces objects the sender has
    Inv(Vec<InventoryItem>),
    /// Request for specific inventory
    GetData(Vec<InventoryItem>),
    /// Requested inventory the sender does not have
    NotFound(Vec<InventoryItem>),
    /// Request for an inventory of blocks
    GetBlocks(BlockLocator),
    /// Request for block headers
    GetHeaders(BlockLocator),
    /// Block headers, each a block with an empty transaction list
    Headers(Vec<Block>),
    /// Block message (contains a block)
    Block(Block),
    /// Transaction message (contains a transaction)
    Tx(Transaction),
    /// Liveness check; old peers send it without a nonce
    Ping(Option<u64>),
    /// Reply to a ping
    Pong(u64),
    /// Request for known peer addresses
    GetAddr,
    /// Request for the memory pool contents
    MemPool,
    /// A command with no registered parser
    Unknown(UnknownMessage),
}

impl NetworkMessage {
    /// Get the command string for this message type
    pub fn command(&self) -> &str {
        match self {
            NetworkMessage::Version(_) => "version",
            NetworkMessage::Verack => "verack",
            NetworkMessage::Addr(_) => "addr",
            NetworkMessage::Inv(_) => "inv",
            NetworkMessage::GetData(_) => "getdata",
            NetworkMessage::NotFound(_) => "notfound",
            NetworkMessage::GetBlocks(_) => "getblocks",
            NetworkMessage::GetHeaders(_) => "getheaders",
            NetworkMessage::Headers(_) => "headers",
            NetworkMessage::Block(_) => "block",
            NetworkMessage::Tx(_) => "tx",
            NetworkMessage::Ping(_) => "ping",
            NetworkMessage::Pong(_) => "pong",
            NetworkMessage::GetAddr => "getaddr",
            NetworkMessage::MemPool => "mempool",
            NetworkMessage::Unknown(unknown) => &unknown.command,
        }
    }

    /// Encodes the payload.
    ///
    /// Blocks and transactions go through [`Message::serialize`], so a
    /// retaining parse is cached again afterwards. Unknown messages have
    /// no encoding and fail with [`CodecError::Unsupported`].
    pub fn payload(&mut self) -> Result<Bytes> {
        match self {
            NetworkMessage::Block(block) => block.serialize(),
            NetworkMessage::Tx(tx) => tx.serialize(),
            NetworkMessage::Unknown(unknown) => Err(CodecError::Unsupported(format!(
                "no encoding for unknown command {:?}",
                unknown.command
            ))),
            other => {
                let mut out = Vec::new();
                other.encode_into(&mut out)?;
                Ok(Bytes::from(out))
            }
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            NetworkMessage::Version(version) => version.write(out),
            NetworkMessage::Verack | NetworkMessage::GetAddr | NetworkMessage::MemPool => {}
            NetworkMessage::Addr(addresses) => {
                write_varint(out, addresses.len() as u64);
                for addr in addresses {
                    addr.write(out);
                }
            }
            NetworkMessage::Inv(items)
            | NetworkMessage::GetData(items)
            | NetworkMessage::NotFound(items) => {
                write_varint(out, items.len() as u64);
                for item in items {
                    item.write(out);
                }
            }
            NetworkMessage::GetBlocks(locator) | NetworkMessage::GetHeaders(locator) => {
                locator.write(out)
            }
            NetworkMessage::Headers(headers) => {
                write_varint(out, headers.len() as u64);
                for header in headers {
                    header.serialize_into(out)?;
                }
            }
            NetworkMessage::Block(block) => block.serialize_into(out)?,
            NetworkMessage::Tx(tx) => tx.serialize_into(out)?,
            NetworkMessage::Ping(nonce) => {
                if let Some(nonce) = nonce {
                    out.extend_from_slice(&nonce.to_le_bytes());
                }
            }
            NetworkMessage::Pong(nonce) => out.extend_from_slice(&nonce.to_le_bytes()),
            NetworkMessage::Unknown(unknown) => {
                return Err(CodecError::Unsupported(format!(
                    "no encoding for unknown command {:?}",
                    unknown.command
                )))
            }
        }
        Ok(())
    }
}

/// Payload of a command no parser is registered for.
///
/// It can be inspected but not serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessage {
    /// Command name from the frame header
    pub command: String,
    /// Raw payload
    pub payload: Bytes,
}

/// Version message (sent when a connection is established)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMessage {
    /// Protocol version
    pub version: u32,
    /// Services supported by this node
    pub services: u64,
    /// Timestamp of this message
    pub time: i64,
    /// Address of the remote node
    pub receiver: PeerAddress,
    /// Address of the local node
    pub sender: PeerAddress,
    /// Random nonce to detect connections to self
    pub nonce: u64,
    /// User agent string
    pub sub_ver: String,
    /// Height of the sender's best chain
    pub best_height: u32,
    /// Whether to relay transactions before a filter is set
    pub relay: bool,
}

impl VersionMessage {
    /// User agent sent by this library
    pub const USER_AGENT: &'static str = "/paycoin-rs:0.1.0/";

    /// A version message for a local node at `best_height`.
    pub fn new(params: &NetworkParams, best_height: u32, nonce: u64) -> Self {
        Self {
            version: params.protocol_version,
            services: 0,
            time: current_timestamp(),
            receiver: PeerAddress::localhost(params.port, 0),
            sender: PeerAddress::localhost(params.port, 0),
            nonce,
            sub_ver: Self::USER_AGENT.to_string(),
            best_height,
            relay: true,
        }
    }

    /// Decodes a version payload. Old peers stop after the nonce, or after
    /// the user agent or best height; missing fields take their defaults.
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        let version = reader.read_u32_le()?;
        let services = reader.read_u64_le()?;
        let time = reader.read_i64_le()?;
        let receiver = PeerAddress::read(reader, false)?;
        let sender = PeerAddress::read(reader, false)?;
        let nonce = reader.read_u64_le()?;
        let sub_ver = if reader.is_empty() {
            String::new()
        } else {
            reader.read_var_str()?
        };
        let best_height = if reader.is_empty() {
            0
        } else {
            reader.read_u32_le()?
        };
        let relay = if reader.is_empty() {
            true
        } else {
            reader.read_u8()? != 0
        };
        Ok(Self {
            version,
            services,
            time,
            receiver,
            sender,
            nonce,
            sub_ver,
            best_height,
            relay,
        })
    }

    /// Appends the full encoding, optional fields included.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        self.receiver.write(out);
        self.sender.write(out);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        write_var_bytes(out, self.sub_ver.as_bytes());
        out.extend_from_slice(&self.best_height.to_le_bytes());
        out.push(u8::from(self.relay));
    }
}

/// Body of `getblocks` and `getheaders`: where the sender's chain is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocator {
    /// Protocol version
    pub version: u32,
    /// Block hashes, newest first
    pub hashes: Vec<Sha256Hash>,
    /// Hash of the last desired block, zero for as many as possible
    pub stop_hash: Sha256Hash,
}

impl BlockLocator {
    fn read(reader: &mut ByteReader) -> Result<Self> {
        let version = reader.read_u32_le()?;
        let count = read_limited(reader, 32, MAX_LOCATOR_HASHES, "locator hash")?;
        let hashes = (0..count)
            .map(|_| reader.read_hash())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            version,
            hashes,
            stop_hash: reader.read_hash()?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        write_varint(out, self.hashes.len() as u64);
        for hash in &self.hashes {
            out.extend_from_slice(hash.as_bytes());
        }
        out.extend_from_slice(self.stop_hash.as_bytes());
    }
}

fn read_limited(reader: &mut ByteReader, min_item_size: usize, limit: usize, what: &str) -> Result<usize> {
    let count = reader.read_count(min_item_size, what)?;
    if count > limit {
        return Err(CodecError::violation(format!(
            "{} {} entries, at most {} allowed",
            count, what, limit
        )));
    }
    Ok(count)
}

fn finish<T>(reader: &ByteReader, command: &str, message: T) -> Result<T> {
    if !reader.is_empty() {
        trace!("ignoring {} trailing bytes in {}", reader.remaining(), command);
    }
    Ok(message)
}

fn parse_version(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let mut reader = ByteReader::new(payload);
    let version = VersionMessage::read(&mut reader)?;
    finish(&reader, "version", NetworkMessage::Version(version))
}

fn parse_verack(_payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    Ok(NetworkMessage::Verack)
}

fn parse_addr(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let mut reader = ByteReader::new(payload);
    let count = read_limited(&mut reader, PeerAddress::TIMESTAMPED_SIZE, MAX_ADDRESSES, "address")?;
    let addresses = (0..count)
        .map(|_| PeerAddress::read(&mut reader, true))
        .collect::<Result<Vec<_>>>()?;
    finish(&reader, "addr", NetworkMessage::Addr(addresses))
}

fn read_inventory(payload: Bytes) -> Result<(ByteReader, Vec<InventoryItem>)> {
    let mut reader = ByteReader::new(payload);
    let count = read_limited(&mut reader, InventoryItem::SIZE, MAX_INVENTORY_ITEMS, "inventory")?;
    let items = (0..count)
        .map(|_| InventoryItem::read(&mut reader))
        .collect::<Result<Vec<_>>>()?;
    Ok((reader, items))
}

fn parse_inv(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let (reader, items) = read_inventory(payload)?;
    finish(&reader, "inv", NetworkMessage::Inv(items))
}

fn parse_getdata(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let (reader, items) = read_inventory(payload)?;
    finish(&reader, "getdata", NetworkMessage::GetData(items))
}

fn parse_notfound(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let (reader, items) = read_inventory(payload)?;
    finish(&reader, "notfound", NetworkMessage::NotFound(items))
}

fn parse_getblocks(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let mut reader = ByteReader::new(payload);
    let locator = BlockLocator::read(&mut reader)?;
    finish(&reader, "getblocks", NetworkMessage::GetBlocks(locator))
}

fn parse_getheaders(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let mut reader = ByteReader::new(payload);
    let locator = BlockLocator::read(&mut reader)?;
    finish(&reader, "getheaders", NetworkMessage::GetHeaders(locator))
}

fn parse_headers(payload: Bytes, config: ParseConfig) -> Result<NetworkMessage> {
    let mut reader = ByteReader::new(payload);
    // Header, empty transaction count, empty signature
    let count = read_limited(&mut reader, paycoin_core::HEADER_SIZE + 2, MAX_HEADERS, "header")?;
    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        let block = Block::read(&mut reader, config)?;
        let transactions = block.transactions()?.len();
        if transactions != 0 {
            return Err(CodecError::violation(format!(
                "block header in headers message carries {} transactions",
                transactions
            )));
        }
        headers.push(block);
    }
    finish(&reader, "headers", NetworkMessage::Headers(headers))
}

fn parse_block(payload: Bytes, config: ParseConfig) -> Result<NetworkMessage> {
    Ok(NetworkMessage::Block(Block::from_bytes(payload, config)?))
}

fn parse_tx(payload: Bytes, config: ParseConfig) -> Result<NetworkMessage> {
    Ok(NetworkMessage::Tx(Transaction::from_bytes(payload, config)?))
}

fn parse_ping(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    if payload.is_empty() {
        return Ok(NetworkMessage::Ping(None));
    }
    let mut reader = ByteReader::new(payload);
    let nonce = reader.read_u64_le()?;
    finish(&reader, "ping", NetworkMessage::Ping(Some(nonce)))
}

fn parse_pong(payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    let mut reader = ByteReader::new(payload);
    let nonce = reader.read_u64_le()?;
    finish(&reader, "pong", NetworkMessage::Pong(nonce))
}

fn parse_getaddr(_payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    Ok(NetworkMessage::GetAddr)
}

fn parse_mempool(_payload: Bytes, _config: ParseConfig) -> Result<NetworkMessage> {
    Ok(NetworkMessage::MemPool)
}

/// Parsers for every command this crate understands.
pub fn default_parsers() -> [(&'static str, PayloadParser); 15] {
    [
        ("version", parse_version as PayloadParser),
        ("verack", parse_verack),
        ("addr", parse_addr),
        ("inv", parse_inv),
        ("getdata", parse_getdata),
        ("notfound", parse_notfound),
        ("getblocks", parse_getblocks),
        ("getheaders", parse_getheaders),
        ("headers", parse_headers),
        ("block", parse_block),
        ("tx", parse_tx),
        ("ping", parse_ping),
        ("pong", parse_pong),
        ("getaddr", parse_getaddr),
        ("mempool", parse_mempool),
    ]
}
