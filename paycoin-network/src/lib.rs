//! Paycoin Network
//!
//! Framing for the Paycoin peer-to-peer protocol: network parameters, the
//! message envelope, command dispatch and a `tokio_util` codec. Blocks and
//! transactions are decoded with `paycoin-core`, keeping its lazy parsing
//! and byte caching all the way from the socket buffer.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

/// Stream adapter for `tokio_util` framed transports.
pub mod codec;

/// Error types for the network layer.
pub mod error;

/// Network parameters, messages and the frame codec.
pub mod protocol;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::codec::FrameCodec;
    pub use crate::error::{NetworkError, NetworkResult};
    pub use crate::protocol::message::{
        BlockLocator, NetworkMessage, PayloadParser, UnknownMessage, VersionMessage,
    };
    pub use crate::protocol::serializer::{PacketHeader, Serializer, SerializerConfig};
    pub use crate::protocol::{
        InventoryItem, InventoryKind, Network, NetworkParams, PeerAddress, MAX_MESSAGE_SIZE,
    };
}

pub use prelude::*;
