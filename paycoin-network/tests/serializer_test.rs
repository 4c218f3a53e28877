use std::net::{IpAddr, Ipv4Addr};

use bytes::Bytes;
use hex_literal::hex;
use paycoin_core::prelude::*;
use paycoin_network::prelude::*;

static ADDR_MESSAGE: [u8; 55] = hex!(
    "e6e8e9e56164647200000000000000001f000000"
    "ed52399b01e215104d010000000000000000000000000000000000ffff0a000001208d"
);

static HEADERS_MESSAGE: [u8; 107] = hex!(
    "e6e8e9e5686561646572730000000000" "53000000" "a25e0bfc"
    "01010000006fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000"
    "982051fd1e4ba744bbbe680e1fee14677ba1a3c3540bf7b1cdb606e857233e0e61bc6649ffff001d01e362990000"
);

static HEADERS6_MESSAGE: [u8; 517] = hex!(
    "e6e8e9e5686561646572730000000000ed010000" "ef3fcbd7"
    "06"
    "010000006fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000982051fd1e4ba744bbbe680e1fee14677ba1a3c3540bf7b1cdb606e857233e0e61bc6649ffff001d01e362990000"
    "010000004860eb18bf1b1620e37e9490fc8a427514416fd75159ab86688e9a8300000000d5fdcc541e25de1c7a5addedf24858b8bb665c9f36ef744ee42c316022c90f9bb0bc6649ffff001d08d2bd610000"
    "01000000bddd99ccfda39da1b108ce1a5d70038d0a967bacb68b6b63065f626a0000000044f672226090d85db9a9f2fbfe5f0f9609b387af7be5b7fbb7a1767c831c9e995dbe6649ffff001d05e0ed6d0000"
    "010000004944469562ae1c2c74d9a535e00b6f3e40ffbad4f2fda3895501b582000000007a06ea98cd40ba2e3288262b28638cec5337c1456aaf5eedc8e9e5a20f062bdf8cc16649ffff001d2bfee0a90000"
    "0100000085144a84488ea88d221c8bd6c059da090e88f8a2c99690ee55dbba4e00000000e11c48fecdd9e72510ca84f023370c9a38bf91ac5cae88019bee94d24528526344c36649ffff001d1d03e4770000"
    "01000000fc33f596f822a0a1951ffdbf2a897b095636ad871707bf5d3162729b00000000379dfb96a5ea8c81700ea4ac6b97ae9a9312b2d4301a29580e924ee6761a2520adc46649ffff001d189c4c970000"
);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tx_message() -> Bytes {
    init_logger();
    let hex_str: String = include_str!("data/tx_message.hex")
        .split_whitespace()
        .collect();
    Bytes::from(hex::decode(hex_str).unwrap())
}

/// Peercoin framing with checksums, as captured from live peers.
fn peercoin(parse: ParseConfig) -> Serializer {
    Serializer::new(NetworkParams::peercoin_mainnet())
        .with_checksum(true)
        .with_parse_config(parse)
}

fn deserialize(serializer: &Serializer, frame: impl Into<Bytes>) -> NetworkMessage {
    serializer.deserialize(&mut ByteReader::new(frame)).unwrap()
}

fn serialize(serializer: &Serializer, message: &mut NetworkMessage) -> Vec<u8> {
    let mut out = Vec::new();
    serializer.serialize(message, &mut out).unwrap();
    out
}

fn expect_tx(message: NetworkMessage) -> Transaction {
    match message {
        NetworkMessage::Tx(tx) => tx,
        other => panic!("expected tx, got {}", other.command()),
    }
}

fn expect_headers(message: NetworkMessage) -> Vec<Block> {
    match message {
        NetworkMessage::Headers(headers) => headers,
        other => panic!("expected headers, got {}", other.command()),
    }
}

#[test]
fn test_addr() {
    init_logger();
    let serializer = peercoin(ParseConfig::default());
    let mut message = deserialize(&serializer, &ADDR_MESSAGE[..]);

    let NetworkMessage::Addr(addresses) = &message else {
        panic!("expected addr, got {}", message.command());
    };
    assert_eq!(addresses.len(), 1);
    let addr = addresses[0];
    assert_eq!(addr.time, Some(1_292_899_810));
    assert_eq!(addr.services, 1);
    assert_eq!(addr.port, 8333);
    assert_eq!(addr.ip_addr(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));

    assert_eq!(serialize(&serializer, &mut message), ADDR_MESSAGE);
}

#[test]
fn test_lazy_parsing() {
    let frame = tx_message();
    let serializer = peercoin(ParseConfig::LAZY);

    let tx = expect_tx(deserialize(&serializer, frame.clone()));
    assert!(!tx.is_parsed());
    assert!(!tx.is_cached());
    assert_eq!(tx.inputs().unwrap().len(), 2);
    assert!(tx.is_parsed());

    assert_eq!(serialize(&serializer, &mut NetworkMessage::Tx(tx)), frame);
}

#[test]
fn test_cached_parsing() {
    let frame = tx_message();
    for lazy in [true, false] {
        let serializer = peercoin(ParseConfig::new(lazy, true));

        // A field write uncaches the transaction but not its children
        let mut tx = expect_tx(deserialize(&serializer, frame.clone()));
        assert_eq!(tx.is_parsed(), !lazy);
        assert!(tx.is_cached());
        tx.set_lock_time(1).unwrap();
        assert!(!tx.is_cached());
        assert!(tx.inputs().unwrap()[0].is_cached());
        assert_ne!(serialize(&serializer, &mut NetworkMessage::Tx(tx)), frame);

        // A child write uncaches the child and the parent, not siblings
        let mut tx = expect_tx(deserialize(&serializer, frame.clone()));
        tx.input_mut(0).unwrap().set_sequence_number(1).unwrap();
        assert!(!tx.is_cached());
        assert!(!tx.inputs().unwrap()[0].is_cached());
        assert!(tx.inputs().unwrap()[1].is_cached());
        assert_ne!(serialize(&serializer, &mut NetworkMessage::Tx(tx)), frame);

        // Untouched round trip
        let tx = expect_tx(deserialize(&serializer, frame.clone()));
        assert!(tx.is_cached());
        assert_eq!(serialize(&serializer, &mut NetworkMessage::Tx(tx)), frame);

        // Writing a field's existing value still round-trips
        let mut tx = expect_tx(deserialize(&serializer, frame.clone()));
        let sequence = tx.inputs().unwrap()[0].sequence_number().unwrap();
        tx.input_mut(0).unwrap().set_sequence_number(sequence).unwrap();
        assert!(!tx.is_cached());
        let mut message = NetworkMessage::Tx(tx);
        assert_eq!(serialize(&serializer, &mut message), frame);

        // Serializing through the frame codec recaches the retained tree
        let tx = expect_tx(message);
        assert!(tx.is_cached());
        assert!(tx.inputs().unwrap()[0].is_cached());
    }
}

#[test]
fn test_tx_message_every_config() {
    let frame = tx_message();
    for parse in ParseConfig::ALL {
        let serializer = peercoin(parse);
        let tx = expect_tx(deserialize(&serializer, frame.clone()));
        assert_eq!(tx.length(), 377);
        assert_eq!(
            tx.hash().unwrap().to_string(),
            "6a3177ac4f52ba4fcef103f23b7ca5bc277385c1cbc0d1c4cbbb2ede2619b360"
        );
        assert_eq!(serialize(&serializer, &mut NetworkMessage::Tx(tx)), frame);
    }
}

#[test]
fn test_headers1() {
    init_logger();
    for parse in ParseConfig::ALL {
        let serializer = peercoin(parse);
        let mut message = deserialize(&serializer, &HEADERS_MESSAGE[..]);
        let headers = match &message {
            NetworkMessage::Headers(headers) => headers,
            other => panic!("expected headers, got {}", other.command()),
        };
        assert_eq!(headers.len(), 1);

        let block = &headers[0];
        assert_eq!(
            block.hash().unwrap().to_string(),
            "00000000839a8e6886ab5951d76f411475428afc90947ee320161bbf18eb6048"
        );
        assert!(block.transactions().unwrap().is_empty());
        assert!(block.signature().unwrap().is_empty());
        assert_eq!(
            block.merkle_root().unwrap().to_string(),
            "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098"
        );

        assert_eq!(serialize(&serializer, &mut message), HEADERS_MESSAGE);
    }
}

#[test]
fn test_headers2() {
    init_logger();
    let serializer = peercoin(ParseConfig::LAZY_RETAIN);
    let headers = expect_headers(deserialize(&serializer, &HEADERS6_MESSAGE[..]));
    assert_eq!(headers.len(), 6);

    assert_eq!(
        headers[0].hash().unwrap().to_string(),
        "00000000839a8e6886ab5951d76f411475428afc90947ee320161bbf18eb6048"
    );
    assert_eq!(headers[0].nonce().unwrap(), 2_573_394_689);

    assert_eq!(
        headers[3].hash().unwrap().to_string(),
        "000000004ebadb55ee9096c9a2f8880e09da59c0d68b1c228da88e48844a1485"
    );
    assert_eq!(headers[3].nonce().unwrap(), 2_850_094_635);

    // Each header links to the one before it
    for pair in headers.windows(2) {
        assert_eq!(pair[1].prev_block_hash().unwrap(), pair[0].hash().unwrap());
    }
}

#[test]
fn test_headers_with_transactions_rejected() {
    init_logger();
    let mut block = Block::new(BlockHeader {
        version: 1,
        prev_block_hash: Sha256Hash::ZERO,
        merkle_root: Sha256Hash::ZERO,
        time: 0,
        difficulty_target: 0x1d00ffff,
        nonce: 0,
    });
    let mut tx = Transaction::new(0);
    tx.add_input(TransactionInput::coinbase(vec![0x51])).unwrap();
    block.add_transaction(tx).unwrap();

    let mut payload = vec![1];
    payload.extend(block.to_bytes().unwrap());

    let serializer = peercoin(ParseConfig::default());
    let mut frame = Vec::new();
    serializer.serialize_raw("headers", &payload, &mut frame).unwrap();
    let err = serializer
        .deserialize(&mut ByteReader::new(frame))
        .unwrap_err();
    assert!(matches!(err, CodecError::ProtocolViolation(_)), "{:?}", err);
}

#[test]
fn test_packet_header() {
    let serializer = Serializer::new(NetworkParams::peercoin_mainnet());

    let err = serializer
        .read_header(&mut ByteReader::new(vec![0u8]))
        .unwrap_err();
    assert!(matches!(err, CodecError::BufferUnderrun { .. }));

    // Payload size one over the limit, little-endian
    let wrong_length = hex!("000000000000000000000000010000020000000000");
    let mut reader = ByteReader::new(wrong_length.to_vec());
    let err = serializer.read_header(&mut reader).unwrap_err();
    assert!(matches!(err, CodecError::ProtocolViolation(_)));
    assert_eq!(reader.remaining(), 5);
}

#[test]
fn test_seek_past_magic_bytes() {
    let serializer = Serializer::new(NetworkParams::peercoin_mainnet());
    let err = serializer
        .seek_past_magic_bytes(&mut ByteReader::new(hex!("000000").to_vec()))
        .unwrap_err();
    assert_eq!(err, CodecError::ResyncFailure);
}

#[test]
fn test_unknown_command() {
    init_logger();
    let serializer = Serializer::new(NetworkParams::unit_test());
    let mut frame = Vec::new();
    serializer.serialize_raw("foo", b"abcde", &mut frame).unwrap();
    assert_eq!(frame.len(), 20 + 5);

    let mut message = deserialize(&serializer, frame);
    assert_eq!(message.command(), "foo");
    match &message {
        NetworkMessage::Unknown(unknown) => assert_eq!(&unknown.payload[..], b"abcde"),
        other => panic!("expected unknown, got {}", other.command()),
    }

    let mut out = Vec::new();
    let err = serializer.serialize(&mut message, &mut out).unwrap_err();
    assert!(matches!(err, CodecError::Unsupported(_)));
    assert!(out.is_empty());
}

#[test]
fn test_checksum_mismatch() {
    let serializer = peercoin(ParseConfig::default());
    let mut frame = ADDR_MESSAGE.to_vec();
    let last = frame.len() - 1;
    frame[last] ^= 0xff;
    let err = serializer
        .deserialize(&mut ByteReader::new(frame))
        .unwrap_err();
    assert!(matches!(err, CodecError::ProtocolViolation(_)));
}

#[test]
fn test_truncated_payload_is_underrun() {
    let serializer = peercoin(ParseConfig::default());
    let err = serializer
        .deserialize(&mut ByteReader::new(ADDR_MESSAGE[..40].to_vec()))
        .unwrap_err();
    assert!(err.is_underrun());
}

#[test]
fn test_resync_skips_garbage_between_frames() {
    let serializer = Serializer::new(NetworkParams::unit_test());
    let mut stream = Vec::new();
    serializer
        .serialize(&mut NetworkMessage::Pong(1), &mut stream)
        .unwrap();
    stream.extend_from_slice(b"garbage");
    serializer
        .serialize(&mut NetworkMessage::Pong(2), &mut stream)
        .unwrap();

    let mut reader = ByteReader::new(stream);
    assert_eq!(serializer.deserialize(&mut reader).unwrap(), NetworkMessage::Pong(1));
    assert_eq!(serializer.deserialize(&mut reader).unwrap(), NetworkMessage::Pong(2));
    assert_eq!(
        serializer.deserialize(&mut reader).unwrap_err(),
        CodecError::ResyncFailure
    );
}

#[test]
fn test_message_round_trips() {
    init_logger();
    let hash = Sha256Hash::double_sha256(b"paycoin");
    let messages = vec![
        NetworkMessage::Version(VersionMessage::new(&NetworkParams::unit_test(), 1024, 7)),
        NetworkMessage::Verack,
        NetworkMessage::Addr(vec![PeerAddress::localhost(9901, 1).with_time(1_417_113_583)]),
        NetworkMessage::Inv(vec![InventoryItem::block(hash), InventoryItem::transaction(hash)]),
        NetworkMessage::GetData(vec![InventoryItem::transaction(hash)]),
        NetworkMessage::NotFound(vec![InventoryItem::new(InventoryKind::FilteredBlock, hash)]),
        NetworkMessage::GetBlocks(BlockLocator {
            version: 70001,
            hashes: vec![hash],
            stop_hash: Sha256Hash::ZERO,
        }),
        NetworkMessage::Ping(None),
        NetworkMessage::Ping(Some(u64::MAX)),
        NetworkMessage::Pong(3),
        NetworkMessage::GetAddr,
        NetworkMessage::MemPool,
        NetworkMessage::Tx(expect_tx(deserialize(&peercoin(ParseConfig::EAGER), tx_message()))),
    ];

    for checksum in [false, true] {
        let serializer = Serializer::new(NetworkParams::unit_test()).with_checksum(checksum);
        for message in &messages {
            let mut message = message.clone();
            let frame = serialize(&serializer, &mut message);
            let decoded = deserialize(&serializer, frame);
            assert_eq!(decoded, message, "{}", message.command());
            assert_eq!(decoded.command(), message.command());
        }
    }
}
