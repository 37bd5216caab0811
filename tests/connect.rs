//! CONNECT End-to-End Tests
//!
//! Drives the public API the way a broker's connection handler would:
//! raw bytes in, framed decode, policy evaluation, CONNACK decision.
//!
//! Covers:
//! - Wire layout of minimal and fully populated packets
//! - Flag/payload consistency failures
//! - Fixed header framing and incremental input
//! - Policy outcomes for accepted and rejected clients

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use pretty_assertions::assert_eq;

use vibemq_connect::codec::frame::MAX_REMAINING_LENGTH;
use vibemq_connect::policy::{ConnectReturnCode, WillTrigger};
use vibemq_connect::{
    decode_framed, encode_framed, Config, ConnectError, ConnectFields, ConnectPacket,
    ConnectPolicy, ErrorKind, FrameError, Phase, ProtocolVersion, QoS,
};

/// Length-prefixed field
fn field(data: &[u8]) -> Vec<u8> {
    let mut out = (data.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(data);
    out
}

/// Variable header with the given flags byte and keep alive 60
fn header(flags: u8) -> Vec<u8> {
    let mut out = field(b"MQTT");
    out.extend_from_slice(&[0x04, flags, 0x00, 0x3C]);
    out
}

fn framed(body: &[u8]) -> Vec<u8> {
    assert!(body.len() < 128);
    let mut out = vec![0x10, body.len() as u8];
    out.extend_from_slice(body);
    out
}

// ============================================================================
// Wire layout
// ============================================================================

#[test]
fn test_minimal_connect_wire_layout() {
    let packet = ConnectPacket::builder("dev-1").keep_alive(60).build().unwrap();

    let mut buf = BytesMut::new();
    packet.encode(&mut buf).unwrap();

    let mut expected = header(0b0000_0010);
    expected.extend(field(b"dev-1"));
    assert_eq!(&buf[..], &expected[..]);

    let decoded = ConnectPacket::decode(&expected).unwrap();
    assert_eq!(decoded, packet);
    assert_eq!(decoded.client_id(), &Bytes::from_static(b"dev-1"));
    assert!(decoded.will().is_none());
    assert!(decoded.username().is_none());
    assert!(decoded.password().is_none());
}

#[test]
fn test_full_connect_field_order() {
    // will + username + password, will QoS 1, no retain
    let flags = 0b1100_1110;
    let mut bytes = header(flags);
    let fields: [&[u8]; 5] = [b"dev-1", b"lwt/dev-1", b"offline", b"alice", b"s3cret"];
    for f in fields {
        bytes.extend(field(f));
    }

    let packet = ConnectPacket::decode(&bytes).unwrap();
    assert_eq!(packet.connect_flags(), flags);
    assert_eq!(packet.will_topic(), Some(&Bytes::from_static(b"lwt/dev-1")));
    assert_eq!(packet.will_message(), Some(&Bytes::from_static(b"offline")));
    assert_eq!(packet.will_qos(), QoS::AtLeastOnce);
    assert!(!packet.will_retain());
    assert_eq!(packet.username(), Some(&Bytes::from_static(b"alice")));
    assert_eq!(packet.password(), Some(&Bytes::from_static(b"s3cret")));

    let mut buf = BytesMut::new();
    packet.encode(&mut buf).unwrap();
    assert_eq!(&buf[..], &bytes[..]);
}

#[test]
fn test_full_connect_missing_password() {
    let mut bytes = header(0b1100_1110);
    let fields: [&[u8]; 4] = [b"dev-1", b"lwt/dev-1", b"offline", b"alice"];
    for f in fields {
        bytes.extend(field(f));
    }

    let err = ConnectPacket::decode(&bytes).unwrap_err();
    assert_eq!(err, ConnectError::new(Phase::Payload, ErrorKind::MissingPassword));
}

#[test]
fn test_reserved_bit_rejected() {
    let mut bytes = header(0b0000_0001);
    bytes.extend(field(b"dev-1"));

    let err = ConnectPacket::decode(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReservedBitSet);
    assert_eq!(err.phase(), Phase::Header);
    assert_eq!(err.to_string(), format!("header error: {}", ErrorKind::ReservedBitSet));
}

#[test]
fn test_fields_roundtrip_through_build() {
    let fields = ConnectFields {
        protocol_name: "MQIsdp".to_string(),
        protocol_level: 3,
        clean_session: false,
        keep_alive: 0,
        client_id: Bytes::from_static(b"legacy"),
        username_flag: true,
        username: Some(Bytes::from_static(b"bob")),
        ..Default::default()
    };
    let packet = ConnectPacket::build(fields.clone()).unwrap();
    assert_eq!(packet.protocol_version(), Some(ProtocolVersion::V31));
    assert_eq!(packet.fields(), fields);

    let mut buf = BytesMut::new();
    packet.encode(&mut buf).unwrap();
    assert_eq!(ConnectPacket::decode(&buf).unwrap().into_fields(), fields);
}

// ============================================================================
// Framing
// ============================================================================

#[test]
fn test_framed_roundtrip() {
    let packet = ConnectPacket::builder("sensor-42")
        .will("sensors/42/state", "lost", QoS::ExactlyOnce, true)
        .credentials("sensor", "pw")
        .build()
        .unwrap();

    let mut buf = BytesMut::new();
    encode_framed(&packet, &mut buf).unwrap();

    let (decoded, consumed) = decode_framed(&buf, MAX_REMAINING_LENGTH).unwrap().unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(decoded, packet);
}

#[test]
fn test_framed_incremental_input() {
    let mut body = header(0b0000_0010);
    body.extend(field(b"dev-1"));
    let bytes = framed(&body);

    for len in 0..bytes.len() {
        assert_eq!(decode_framed(&bytes[..len], MAX_REMAINING_LENGTH), Ok(None));
    }
    let (packet, consumed) = decode_framed(&bytes, MAX_REMAINING_LENGTH).unwrap().unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(packet.client_id(), &Bytes::from_static(b"dev-1"));
}

#[test]
fn test_framed_followed_by_next_packet() {
    let mut body = header(0b0000_0010);
    body.extend(field(b"dev-1"));
    let mut bytes = framed(&body);
    let packet_len = bytes.len();
    // PINGREQ pipelined after CONNECT
    bytes.extend_from_slice(&[0xC0, 0x00]);

    let (_, consumed) = decode_framed(&bytes, MAX_REMAINING_LENGTH).unwrap().unwrap();
    assert_eq!(consumed, packet_len);
}

#[test]
fn test_framed_body_error() {
    let mut body = header(0b0000_0001);
    body.extend(field(b"dev-1"));
    let bytes = framed(&body);

    let err = decode_framed(&bytes, MAX_REMAINING_LENGTH).unwrap_err();
    assert_eq!(
        err,
        FrameError::Connect(ConnectError::new(Phase::Header, ErrorKind::ReservedBitSet))
    );
}

#[test]
fn test_framed_configured_limit() {
    let config = Config::parse("[limits]\nmax_packet_size = 16\n").unwrap();
    let mut body = header(0b0000_0010);
    body.extend(field(b"a-client-id-longer-than-the-limit"));
    let bytes = framed(&body);

    assert_eq!(
        decode_framed(&bytes, config.limits.max_packet_size),
        Err(FrameError::PacketTooLarge)
    );
}

// ============================================================================
// Policy
// ============================================================================

#[test]
fn test_connack_flow_accepted() {
    let policy = ConnectPolicy::default();
    let packet = ConnectPacket::builder("dev-1")
        .keep_alive(30)
        .will("dev/1/status", "offline", QoS::AtLeastOnce, false)
        .build()
        .unwrap();

    let mut buf = BytesMut::new();
    encode_framed(&packet, &mut buf).unwrap();
    let (decoded, _) = decode_framed(&buf, MAX_REMAINING_LENGTH).unwrap().unwrap();

    let params = policy.evaluate(&decoded).unwrap();
    assert_eq!(params.client_id, "dev-1");
    assert_eq!(params.keep_alive.timeout(), Some(Duration::from_secs(45)));
    assert!(params.keep_alive.is_expired(Duration::from_secs(46)));

    let will = params.will.unwrap();
    assert!(will.publishes_on(WillTrigger::KeepAliveTimeout));
    assert!(!will.publishes_on(WillTrigger::Disconnect));
}

#[test]
fn test_connack_flow_rejected_version() {
    let policy = ConnectPolicy::default();
    let packet = ConnectPacket::builder("dev-1")
        .version(ProtocolVersion::V5)
        .build()
        .unwrap();

    let rejection = policy.evaluate(&packet).unwrap_err();
    assert_eq!(
        rejection.response.map(ConnectReturnCode::as_u8),
        Some(0x01)
    );
}

#[test]
fn test_connack_flow_malformed() {
    let policy = ConnectPolicy::default();
    let err = ConnectPacket::decode(&header(0b0100_0010)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PasswordWithoutUsername);

    let rejection = policy.on_decode_error(&err);
    assert_eq!(rejection.response, None);
}

#[test]
fn test_policy_from_config() {
    let config = Config::parse(
        r#"
[policy]
allow_empty_client_id = false
"#,
    )
    .unwrap();
    let policy = ConnectPolicy::new(&config.policy);

    let packet = ConnectPacket::builder("").build().unwrap();
    let rejection = policy.evaluate(&packet).unwrap_err();
    assert_eq!(rejection.response, Some(ConnectReturnCode::IdentifierRejected));
}
