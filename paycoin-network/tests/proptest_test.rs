use std::net::{Ipv6Addr, SocketAddr};

use bytes::BytesMut;
use paycoin_core::Sha256Hash;
use paycoin_network::prelude::*;
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

fn arb_peer_address() -> impl Strategy<Value = PeerAddress> {
    (any::<u32>(), any::<u64>(), any::<[u8; 16]>(), any::<u16>()).prop_map(
        |(time, services, ip, port)| {
            PeerAddress::new(SocketAddr::new(Ipv6Addr::from(ip).into(), port), services)
                .with_time(time)
        },
    )
}

fn arb_inventory() -> impl Strategy<Value = InventoryItem> {
    (0u32..4, any::<[u8; 32]>()).prop_map(|(kind, hash)| {
        InventoryItem::new(InventoryKind::try_from(kind).unwrap(), Sha256Hash(hash))
    })
}

fn arb_message() -> impl Strategy<Value = NetworkMessage> {
    prop_oneof![
        prop::collection::vec(arb_peer_address(), 0..20).prop_map(NetworkMessage::Addr),
        prop::collection::vec(arb_inventory(), 0..50).prop_map(NetworkMessage::Inv),
        prop::collection::vec(arb_inventory(), 0..50).prop_map(NetworkMessage::GetData),
        prop::option::of(any::<u64>()).prop_map(NetworkMessage::Ping),
        any::<u64>().prop_map(NetworkMessage::Pong),
        Just(NetworkMessage::Verack),
        Just(NetworkMessage::GetAddr),
    ]
}

proptest! {
    #[test]
    fn test_frames_survive_any_split(
        messages in prop::collection::vec(arb_message(), 1..6),
        chunk in 1usize..64,
        checksum in any::<bool>(),
    ) {
        let serializer = Serializer::new(NetworkParams::unit_test()).with_checksum(checksum);
        let mut codec = FrameCodec::new(serializer);

        let mut stream = BytesMut::new();
        for message in &messages {
            codec.encode(message.clone(), &mut stream).unwrap();
        }

        let mut src = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in stream.chunks(chunk) {
            src.extend_from_slice(piece);
            while let Some(message) = codec.decode(&mut src).unwrap() {
                decoded.push(message);
            }
        }

        prop_assert!(src.is_empty());
        prop_assert_eq!(decoded, messages);
    }

    #[test]
    fn test_peer_address_ip_is_preserved(addr in arb_peer_address()) {
        let back = PeerAddress::new(addr.socket_addr(), addr.services);
        prop_assert_eq!(back.ip, addr.ip);
        prop_assert_eq!(back.port, addr.port);
    }
}
