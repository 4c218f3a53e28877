//! Network protocol definitions for Paycoin and Peercoin-family peers

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use paycoin_core::serialization::ByteReader;
use paycoin_core::{CodecError, Result, Sha256Hash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod message;
pub mod serializer;

/// Network magic value for the Paycoin main network
pub const PAYCOIN_MAGIC: [u8; 4] = [0xaa, 0xaa, 0xaa, 0xaa];

/// Network magic value for the Peercoin main network
pub const PEERCOIN_MAGIC: [u8; 4] = [0xe6, 0xe8, 0xe9, 0xe5];

/// Network magic value for unit tests
pub const UNIT_TEST_MAGIC: [u8; 4] = [0x0b, 0x11, 0x09, 0x07];

/// Maximum payload size accepted in a frame (32MB)
pub const MAX_MESSAGE_SIZE: u32 = 0x0200_0000;

/// Protocol version advertised in `version` messages
pub const PROTOCOL_VERSION: u32 = 70001;

const PAYCOIN_GENESIS: &str = "00000e5695fbec8e36c10064491946ee3b723a9fa640fc0e25d3b8e4737e53e3";
const PEERCOIN_GENESIS: &str = "0000000032fe677166d54963b62a4677d8957e87c508eaa4fd7eb1c880cd27e3";

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Paycoin main network
    #[default]
    Paycoin,
    /// Peercoin main network
    Peercoin,
    /// Local network for tests
    UnitTest,
}

impl Network {
    /// Get the magic bytes for this network
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Network::Paycoin => PAYCOIN_MAGIC,
            Network::Peercoin => PEERCOIN_MAGIC,
            Network::UnitTest => UNIT_TEST_MAGIC,
        }
    }

    /// Get the default port for this network
    pub fn default_port(&self) -> u16 {
        match self {
            Network::Paycoin | Network::Peercoin => 9901,
            Network::UnitTest => 18333,
        }
    }

    /// Full parameter set for this network
    pub fn params(&self) -> NetworkParams {
        let genesis = match self {
            Network::Peercoin => PEERCOIN_GENESIS,
            Network::Paycoin | Network::UnitTest => PAYCOIN_GENESIS,
        };
        NetworkParams {
            magic: self.magic(),
            port: self.default_port(),
            max_message_size: MAX_MESSAGE_SIZE,
            // Constant strings, always well-formed
            genesis_hash: Sha256Hash::from_hex(genesis).unwrap_or_default(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// Constants that parameterize framing for one network.
///
/// Only the frame codec reads these; payload parsing never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Four bytes that open every frame
    #[serde(with = "magic_hex")]
    pub magic: [u8; 4],
    /// Default peer port
    pub port: u16,
    /// Largest payload a frame may declare
    pub max_message_size: u32,
    /// Hash of the genesis block
    pub genesis_hash: Sha256Hash,
    /// Protocol version this node speaks
    pub protocol_version: u32,
}

impl NetworkParams {
    /// Paycoin main network
    pub fn paycoin_mainnet() -> Self {
        Network::Paycoin.params()
    }

    /// Peercoin main network
    pub fn peercoin_mainnet() -> Self {
        Network::Peercoin.params()
    }

    /// Unit test network
    pub fn unit_test() -> Self {
        Network::UnitTest.params()
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::paycoin_mainnet()
    }
}

impl From<Network> for NetworkParams {
    fn from(network: Network) -> Self {
        network.params()
    }
}

mod magic_hex {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(magic: &[u8; 4], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(magic))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<[u8; 4], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("magic must be 4 bytes: {}", s)))
    }
}

/// Address of a peer as it appears in `version` and `addr` payloads.
///
/// IPv4 addresses are carried IPv4-mapped. The port is big-endian, unlike
/// every other integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    /// Last-seen time; only present inside `addr` messages
    pub time: Option<u32>,
    /// Service bits
    pub services: u64,
    /// Address, IPv4-mapped for IPv4 peers
    pub ip: Ipv6Addr,
    /// Port
    pub port: u16,
}

impl PeerAddress {
    /// Encoded size without the timestamp.
    pub const SIZE: usize = 26;
    /// Encoded size with the timestamp.
    pub const TIMESTAMPED_SIZE: usize = 30;

    /// Create a new peer address
    pub fn new(addr: SocketAddr, services: u64) -> Self {
        let ip = match addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        Self {
            time: None,
            services,
            ip,
            port: addr.port(),
        }
    }

    /// `127.0.0.1` on `port`
    pub fn localhost(port: u16, services: u64) -> Self {
        Self::new(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port), services)
    }

    /// Attaches a last-seen time.
    pub fn with_time(mut self, time: u32) -> Self {
        self.time = Some(time);
        self
    }

    /// The address, unmapped when it is IPv4
    pub fn ip_addr(&self) -> IpAddr {
        match self.ip.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(self.ip),
        }
    }

    /// Address and port
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip_addr(), self.port)
    }

    /// Encoded size
    pub fn encoded_len(&self) -> usize {
        if self.time.is_some() {
            Self::TIMESTAMPED_SIZE
        } else {
            Self::SIZE
        }
    }

    /// Reads an address, with a leading timestamp when `timestamped`.
    pub fn read(reader: &mut ByteReader, timestamped: bool) -> Result<Self> {
        let time = if timestamped {
            Some(reader.read_u32_le()?)
        } else {
            None
        };
        Ok(Self {
            time,
            services: reader.read_u64_le()?,
            ip: Ipv6Addr::from(reader.read_fixed::<16>()?),
            port: reader.read_u16_be()?,
        })
    }

    /// Appends the encoding to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        if let Some(time) = self.time {
            out.extend_from_slice(&time.to_le_bytes());
        }
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.ip.octets());
        out.extend_from_slice(&self.port.to_be_bytes());
    }
}

/// Inventory type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum InventoryKind {
    /// Any data of no interest
    Error = 0,
    /// A transaction
    Transaction = 1,
    /// A full block
    Block = 2,
    /// A block filtered through a bloom filter
    FilteredBlock = 3,
}

impl TryFrom<u32> for InventoryKind {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(InventoryKind::Error),
            1 => Ok(InventoryKind::Transaction),
            2 => Ok(InventoryKind::Block),
            3 => Ok(InventoryKind::FilteredBlock),
            _ => Err(CodecError::violation(format!("unknown inventory type {}", value))),
        }
    }
}

/// Inventory vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryItem {
    /// The type of inventory
    pub kind: InventoryKind,
    /// The hash of the inventory item
    pub hash: Sha256Hash,
}

impl InventoryItem {
    /// Encoded size.
    pub const SIZE: usize = 36;

    /// Create a new inventory item
    pub fn new(kind: InventoryKind, hash: Sha256Hash) -> Self {
        Self { kind, hash }
    }

    /// Create a new transaction inventory item
    pub fn transaction(hash: Sha256Hash) -> Self {
        Self::new(InventoryKind::Transaction, hash)
    }

    /// Create a new block inventory item
    pub fn block(hash: Sha256Hash) -> Self {
        Self::new(InventoryKind::Block, hash)
    }

    pub(crate) fn read(reader: &mut ByteReader) -> Result<Self> {
        let kind = InventoryKind::try_from(reader.read_u32_le()?)?;
        Ok(Self::new(kind, reader.read_hash()?))
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.kind as u32).to_le_bytes());
        out.extend_from_slice(self.hash.as_bytes());
    }
}

/// Current timestamp in seconds since epoch
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
