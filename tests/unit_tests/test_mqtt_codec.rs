// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Bytes, BytesMut};
use dali_gateway_rs::mqtt::codec::{
    CodecError, ConnAck, Connect, Packet, Publish, SubAck, Subscribe, decode, encode,
};

fn round_trip(packet: Packet) -> Packet {
    let mut buf = BytesMut::new();
    encode(&packet, &mut buf).expect("encode");
    let decoded = decode(&mut buf).expect("decode").expect("complete frame");
    assert!(buf.is_empty());
    decoded
}

#[test]
fn connect_round_trip() {
    let packet = Packet::Connect(Connect {
        client_id: "ha_dali_center_GW-1".to_string(),
        username: Some("admin".to_string()),
        password: Some("pw".to_string()),
        keep_alive_secs: 30,
        clean_session: true,
    });
    assert_eq!(round_trip(packet.clone()), packet);
}

#[test]
fn connect_without_credentials() {
    let packet = Packet::Connect(Connect {
        client_id: "c".to_string(),
        username: None,
        password: None,
        keep_alive_secs: 60,
        clean_session: true,
    });
    assert_eq!(round_trip(packet.clone()), packet);
}

#[test]
fn connack_known_bytes() {
    // CONNACK with return code 4 (bad credentials)
    let mut buf = BytesMut::from(&[0x20u8, 0x02, 0x00, 0x04][..]);
    let packet = decode(&mut buf).expect("decode").expect("frame");
    assert_eq!(
        packet,
        Packet::ConnAck(ConnAck {
            session_present: false,
            code: 4
        })
    );
}

#[test]
fn pingreq_known_bytes() {
    let mut buf = BytesMut::new();
    encode(&Packet::PingReq, &mut buf).expect("encode");
    assert_eq!(&buf[..], &[0xc0, 0x00]);

    let mut buf = BytesMut::new();
    encode(&Packet::Disconnect, &mut buf).expect("encode");
    assert_eq!(&buf[..], &[0xe0, 0x00]);
}

#[test]
fn publish_qos0_round_trip() {
    let packet = Packet::Publish(Publish::qos0(
        "/GW-1/server/publish/",
        Bytes::from_static(b"{\"cmd\":\"getVersion\"}"),
    ));
    assert_eq!(round_trip(packet.clone()), packet);
}

#[test]
fn publish_qos1_carries_pkid() {
    let packet = Packet::Publish(Publish {
        topic: "/GW-1/client/reciver/".to_string(),
        payload: Bytes::from_static(b"x"),
        qos: 1,
        pkid: Some(7),
        dup: false,
        retain: false,
    });
    match round_trip(packet) {
        Packet::Publish(p) => {
            assert_eq!(p.qos, 1);
            assert_eq!(p.pkid, Some(7));
            assert_eq!(&p.payload[..], b"x");
        },
        other => panic!("unexpected packet {other:?}"),
    }
}

#[test]
fn qos1_publish_without_pkid_is_rejected() {
    let packet = Packet::Publish(Publish {
        topic: "t".to_string(),
        payload: Bytes::new(),
        qos: 1,
        pkid: None,
        dup: false,
        retain: false,
    });
    let mut buf = BytesMut::new();
    assert!(matches!(
        encode(&packet, &mut buf),
        Err(CodecError::MissingPacketId)
    ));
}

#[test]
fn subscribe_suback_round_trip() {
    let sub = Packet::Subscribe(Subscribe {
        pkid: 1,
        filters: vec![("/GW-1/client/reciver/".to_string(), 0)],
    });
    assert_eq!(round_trip(sub.clone()), sub);

    let ack = Packet::SubAck(SubAck {
        pkid: 1,
        codes: vec![0],
    });
    assert_eq!(round_trip(ack.clone()), ack);
}

#[test]
fn puback_round_trip() {
    assert_eq!(round_trip(Packet::PubAck(99)), Packet::PubAck(99));
}

#[test]
fn partial_frames_wait_for_more() {
    let mut buf = BytesMut::new();
    encode(
        &Packet::Publish(Publish::qos0("t", Bytes::from_static(b"payload"))),
        &mut buf,
    )
    .expect("encode");

    let mut partial = BytesMut::from(&buf[..3]);
    assert!(decode(&mut partial).expect("decode").is_none());
    partial.extend_from_slice(&buf[3..]);
    assert!(decode(&mut partial).expect("decode").is_some());
}

#[test]
fn two_frames_in_one_buffer() {
    let mut buf = BytesMut::new();
    encode(&Packet::PingReq, &mut buf).expect("encode");
    encode(&Packet::PingResp, &mut buf).expect("encode");
    assert_eq!(decode(&mut buf).expect("d"), Some(Packet::PingReq));
    assert_eq!(decode(&mut buf).expect("d"), Some(Packet::PingResp));
    assert_eq!(decode(&mut buf).expect("d"), None);
}

#[test]
fn large_payload_uses_multi_byte_length() {
    let payload = Bytes::from(vec![0xabu8; 20_000]);
    let packet = Packet::Publish(Publish::qos0("t", payload));
    match round_trip(packet) {
        Packet::Publish(p) => assert_eq!(p.payload.len(), 20_000),
        other => panic!("unexpected packet {other:?}"),
    }
}

#[test]
fn oversized_remaining_length_rejected() {
    let mut buf = BytesMut::from(&[0x30u8, 0xff, 0xff, 0xff, 0xff, 0x01][..]);
    assert!(matches!(
        decode(&mut buf),
        Err(CodecError::MalformedRemainingLength)
    ));
}
