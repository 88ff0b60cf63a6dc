// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! MQTT 3.1.1 packet codec, limited to the packet types the gateway
//! session exchanges with the broker.
//!
//! Encoding and decoding are symmetric so both the client and the test
//! harness broker run on the same framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 4;

/// Largest body the 4-byte remaining-length varint can describe.
const MAX_REMAINING_LENGTH: usize = 268_435_455;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed remaining length")]
    MalformedRemainingLength,
    #[error("packet body truncated")]
    Truncated,
    #[error("string field is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("unsupported packet type {0:#x}")]
    UnsupportedPacketType(u8),
    #[error("field too long for a u16 length prefix")]
    FieldTooLong,
    #[error("QoS > 0 publish requires a packet id")]
    MissingPacketId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    /// CONNACK return code; 0 means accepted.
    pub code: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: Bytes,
    pub qos: u8,
    pub pkid: Option<u16>,
    pub dup: bool,
    pub retain: bool,
}

impl Publish {
    /// QoS 0 publish, the only flavor the session sends.
    pub fn qos0(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: 0,
            pkid: None,
            dup: false,
            retain: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub pkid: u16,
    pub filters: Vec<(String, u8)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub pkid: u16,
    pub codes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck(u16),
    Subscribe(Subscribe),
    SubAck(SubAck),
    PingReq,
    PingResp,
    Disconnect,
}

fn put_remaining_length(buf: &mut BytesMut, mut len: usize) -> Result<(), CodecError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(CodecError::MalformedRemainingLength);
    }
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if len == 0 {
            return Ok(());
        }
    }
}

fn put_string(buf: &mut BytesMut, s: &str) -> Result<(), CodecError> {
    let len = u16::try_from(s.len()).map_err(|_| CodecError::FieldTooLong)?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Serializes one packet onto `buf`.
pub fn encode(packet: &Packet, buf: &mut BytesMut) -> Result<(), CodecError> {
    let mut body = BytesMut::new();
    let first_byte = match packet {
        Packet::Connect(c) => {
            put_string(&mut body, PROTOCOL_NAME)?;
            body.put_u8(PROTOCOL_LEVEL);
            let mut flags = 0u8;
            if c.clean_session {
                flags |= 0x02;
            }
            if c.password.is_some() {
                flags |= 0x40;
            }
            if c.username.is_some() {
                flags |= 0x80;
            }
            body.put_u8(flags);
            body.put_u16(c.keep_alive_secs);
            put_string(&mut body, &c.client_id)?;
            if let Some(user) = &c.username {
                put_string(&mut body, user)?;
            }
            if let Some(pass) = &c.password {
                put_string(&mut body, pass)?;
            }
            0x10
        },
        Packet::ConnAck(a) => {
            body.put_u8(u8::from(a.session_present));
            body.put_u8(a.code);
            0x20
        },
        Packet::Publish(p) => {
            put_string(&mut body, &p.topic)?;
            if p.qos > 0 {
                let pkid = p.pkid.ok_or(CodecError::MissingPacketId)?;
                body.put_u16(pkid);
            }
            body.put_slice(&p.payload);
            0x30 | (u8::from(p.dup) << 3) | (p.qos << 1) | u8::from(p.retain)
        },
        Packet::PubAck(pkid) => {
            body.put_u16(*pkid);
            0x40
        },
        Packet::Subscribe(s) => {
            body.put_u16(s.pkid);
            for (filter, qos) in &s.filters {
                put_string(&mut body, filter)?;
                body.put_u8(*qos);
            }
            0x82
        },
        Packet::SubAck(s) => {
            body.put_u16(s.pkid);
            body.put_slice(&s.codes);
            0x90
        },
        Packet::PingReq => 0xc0,
        Packet::PingResp => 0xd0,
        Packet::Disconnect => 0xe0,
    };

    buf.put_u8(first_byte);
    put_remaining_length(buf, body.len())?;
    buf.put_slice(&body);
    Ok(())
}

fn take_u8(body: &mut Bytes) -> Result<u8, CodecError> {
    if body.remaining() < 1 {
        return Err(CodecError::Truncated);
    }
    Ok(body.get_u8())
}

fn take_u16(body: &mut Bytes) -> Result<u16, CodecError> {
    if body.remaining() < 2 {
        return Err(CodecError::Truncated);
    }
    Ok(body.get_u16())
}

fn take_string(body: &mut Bytes) -> Result<String, CodecError> {
    let len = take_u16(body)? as usize;
    if body.remaining() < len {
        return Err(CodecError::Truncated);
    }
    let raw = body.split_to(len);
    Ok(String::from_utf8(raw.to_vec())?)
}

/// Decodes one packet off the front of `buf`.
///
/// Returns `Ok(None)` when the buffer holds only a partial frame; the
/// caller reads more bytes and retries.
pub fn decode(buf: &mut BytesMut) -> Result<Option<Packet>, CodecError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let first = buf[0];
    let mut remaining: usize = 0;
    let mut shift = 0u32;
    let mut header_len = 1usize;
    loop {
        let Some(&byte) = buf.get(header_len) else {
            return Ok(None);
        };
        remaining |= ((byte & 0x7f) as usize) << shift;
        header_len += 1;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 21 {
            return Err(CodecError::MalformedRemainingLength);
        }
    }

    let total = header_len + remaining;
    if buf.len() < total {
        return Ok(None);
    }

    let frame = buf.split_to(total).freeze();
    let mut body = frame.slice(header_len..);
    let flags = first & 0x0f;

    let packet = match first >> 4 {
        1 => {
            let _protocol = take_string(&mut body)?;
            let _level = take_u8(&mut body)?;
            let connect_flags = take_u8(&mut body)?;
            let keep_alive_secs = take_u16(&mut body)?;
            let client_id = take_string(&mut body)?;
            if connect_flags & 0x04 != 0 {
                // will topic + will message, tolerated but unused
                let _ = take_string(&mut body)?;
                let _ = take_string(&mut body)?;
            }
            let username = if connect_flags & 0x80 != 0 {
                Some(take_string(&mut body)?)
            } else {
                None
            };
            let password = if connect_flags & 0x40 != 0 {
                Some(take_string(&mut body)?)
            } else {
                None
            };
            Packet::Connect(Connect {
                client_id,
                username,
                password,
                keep_alive_secs,
                clean_session: connect_flags & 0x02 != 0,
            })
        },
        2 => {
            let flags_byte = take_u8(&mut body)?;
            let code = take_u8(&mut body)?;
            Packet::ConnAck(ConnAck {
                session_present: flags_byte & 0x01 != 0,
                code,
            })
        },
        3 => {
            let qos = (flags >> 1) & 0x03;
            let topic = take_string(&mut body)?;
            let pkid = if qos > 0 {
                Some(take_u16(&mut body)?)
            } else {
                None
            };
            Packet::Publish(Publish {
                topic,
                payload: body,
                qos,
                pkid,
                dup: flags & 0x08 != 0,
                retain: flags & 0x01 != 0,
            })
        },
        4 => Packet::PubAck(take_u16(&mut body)?),
        8 => {
            let pkid = take_u16(&mut body)?;
            let mut filters = Vec::new();
            while body.has_remaining() {
                let filter = take_string(&mut body)?;
                let qos = take_u8(&mut body)?;
                filters.push((filter, qos));
            }
            Packet::Subscribe(Subscribe { pkid, filters })
        },
        9 => {
            let pkid = take_u16(&mut body)?;
            Packet::SubAck(SubAck {
                pkid,
                codes: body.to_vec(),
            })
        },
        12 => Packet::PingReq,
        13 => Packet::PingResp,
        14 => Packet::Disconnect,
        other => return Err(CodecError::UnsupportedPacketType(other)),
    };

    Ok(Some(packet))
}
