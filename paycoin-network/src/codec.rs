//! `tokio_util` framing over a [`Serializer`].

use bytes::{Buf, Bytes, BytesMut};
use log::debug;
use paycoin_core::serialization::ByteReader;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::NetworkError;
use crate::protocol::message::NetworkMessage;
use crate::protocol::serializer::Serializer;

/// Splits a byte stream into [`NetworkMessage`]s and back.
///
/// Garbage in front of the magic bytes is discarded. A frame is only
/// decoded once all of it has arrived, so payload slices never span reads.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    serializer: Serializer,
}

impl FrameCodec {
    /// Wrap a configured serializer.
    pub fn new(serializer: Serializer) -> Self {
        Self { serializer }
    }

    /// The wrapped serializer.
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Mutable access, e.g. to register extra commands.
    pub fn serializer_mut(&mut self) -> &mut Serializer {
        &mut self.serializer
    }
}

impl Decoder for FrameCodec {
    type Item = NetworkMessage;
    type Error = NetworkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<NetworkMessage>, NetworkError> {
        let magic = self.serializer.params().magic;
        match self.serializer.find_magic(&src[..]) {
            Some(0) => {}
            Some(pos) => {
                debug!("discarding {} bytes before magic", pos);
                src.advance(pos);
            }
            None => {
                // A partial magic may sit at the very end
                let discard = src.len().saturating_sub(magic.len() - 1);
                if discard > 0 {
                    debug!("discarding {} bytes without magic", discard);
                    src.advance(discard);
                }
                return Ok(None);
            }
        }

        let overhead = self.serializer.frame_overhead();
        if src.len() < overhead {
            return Ok(None);
        }
        let header_bytes = Bytes::copy_from_slice(&src[magic.len()..overhead]);
        let header = self.serializer.read_header(&mut ByteReader::new(header_bytes))?;

        let frame_len = overhead + header.length as usize;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len).freeze();
        let payload = frame.slice(overhead..);
        Ok(Some(self.serializer.deserialize_payload(&header, payload)?))
    }
}

impl Encoder<NetworkMessage> for FrameCodec {
    type Error = NetworkError;

    fn encode(&mut self, mut item: NetworkMessage, dst: &mut BytesMut) -> Result<(), NetworkError> {
        let mut out = Vec::new();
        self.serializer.serialize(&mut item, &mut out)?;
        dst.extend_from_slice(&out);
        Ok(())
    }
}
