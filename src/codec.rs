// src/codec.rs
// Big-endian throughout. No I/O, no allocation beyond the returned frame.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{MoldError, Result};

pub const STREAM_NAME_LEN: usize = 10;
pub type StreamName = [u8; STREAM_NAME_LEN];

pub const HEADER_LEN: usize = STREAM_NAME_LEN + 8 + 2; // name + next_expected + count
pub const LENGTH_PREFIX_LEN: usize = 2;

pub const HEARTBEAT_COUNT: u16 = 0xFFFF;
pub const END_OF_SESSION_COUNT: u16 = 0x0000;

pub const RECOVERY_REQUEST_LEN: usize = STREAM_NAME_LEN + 8 + 2;

// Right-pads (ASCII space) or truncates `raw` to exactly 10 bytes.
pub fn make_stream_name(raw: &str) -> StreamName {
    let mut name = [b' '; STREAM_NAME_LEN];
    let bytes = raw.as_bytes();
    let n = bytes.len().min(STREAM_NAME_LEN);
    name[..n].copy_from_slice(&bytes[..n]);
    name
}

pub fn encode_message(payload: &[u8], mtu: usize) -> Result<Bytes> {
    if payload.len() > u16::MAX as usize {
        return Err(MoldError::MessageTooLarge { len: payload.len(), mtu });
    }
    let budget = mtu.saturating_sub(HEADER_LEN + LENGTH_PREFIX_LEN);
    if payload.len() > budget {
        return Err(MoldError::MessageTooLarge { len: payload.len(), mtu });
    }
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buf.put_u16(payload.len() as u16);
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}

// Caller guarantees the total size fits MTU.
pub fn pack_packet(name: &StreamName, next_expected: u64, encoded: &[Bytes]) -> Bytes {
    let body_len: usize = encoded.iter().map(|e| e.len()).sum();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    buf.extend_from_slice(name);
    buf.put_u64(next_expected);
    buf.put_u16(encoded.len() as u16);
    for e in encoded {
        buf.extend_from_slice(e);
    }
    buf.freeze()
}

pub fn pack_heartbeat(name: &StreamName, next_expected: u64) -> Bytes {
    pack_control(name, next_expected, HEARTBEAT_COUNT)
}

pub fn pack_end_of_session(name: &StreamName, next_expected: u64) -> Bytes {
    pack_control(name, next_expected, END_OF_SESSION_COUNT)
}

fn pack_control(name: &StreamName, next_expected: u64, count: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN);
    buf.extend_from_slice(name);
    buf.put_u64(next_expected);
    buf.put_u16(count);
    buf.freeze()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPacket {
    Data { name: StreamName, next_expected: u64, messages: Vec<Bytes> },
    Heartbeat { name: StreamName, next_expected: u64 },
    EndOfSession { name: StreamName, next_expected: u64 },
}

impl DecodedPacket {
    pub fn name(&self) -> &StreamName {
        match self {
            DecodedPacket::Data { name, .. }
            | DecodedPacket::Heartbeat { name, .. }
            | DecodedPacket::EndOfSession { name, .. } => name,
        }
    }

    pub fn next_expected(&self) -> u64 {
        match self {
            DecodedPacket::Data { next_expected, .. }
            | DecodedPacket::Heartbeat { next_expected, .. }
            | DecodedPacket::EndOfSession { next_expected, .. } => *next_expected,
        }
    }
}

pub fn parse_packet(bytes: &[u8]) -> Result<DecodedPacket> {
    if bytes.len() < HEADER_LEN {
        return Err(MoldError::MalformedRequest("packet shorter than header"));
    }
    let mut name: StreamName = [0u8; STREAM_NAME_LEN];
    name.copy_from_slice(&bytes[0..STREAM_NAME_LEN]);
    let next_expected = u64::from_be_bytes(bytes[10..18].try_into().unwrap());
    let count = u16::from_be_bytes(bytes[18..20].try_into().unwrap());

    match count {
        HEARTBEAT_COUNT => Ok(DecodedPacket::Heartbeat { name, next_expected }),
        END_OF_SESSION_COUNT => Ok(DecodedPacket::EndOfSession { name, next_expected }),
        n => {
            let mut messages = Vec::with_capacity(n as usize);
            let mut off = HEADER_LEN;
            for _ in 0..n {
                if off + LENGTH_PREFIX_LEN > bytes.len() {
                    return Err(MoldError::MalformedRequest("truncated message length"));
                }
                let len =
                    u16::from_be_bytes(bytes[off..off + LENGTH_PREFIX_LEN].try_into().unwrap())
                        as usize;
                off += LENGTH_PREFIX_LEN;
                if off + len > bytes.len() {
                    return Err(MoldError::MalformedRequest("truncated message payload"));
                }
                messages.push(Bytes::copy_from_slice(&bytes[off..off + len]));
                off += len;
            }
            Ok(DecodedPacket::Data { name, next_expected, messages })
        }
    }
}

pub fn parse_recovery_request(bytes: &[u8]) -> Result<(StreamName, u64, u16)> {
    if bytes.len() != RECOVERY_REQUEST_LEN {
        return Err(MoldError::MalformedRequest("recovery request must be exactly 20 bytes"));
    }
    let mut name: StreamName = [0u8; STREAM_NAME_LEN];
    name.copy_from_slice(&bytes[0..STREAM_NAME_LEN]);
    let seq = u64::from_be_bytes(bytes[10..18].try_into().unwrap());
    let count = u16::from_be_bytes(bytes[18..20].try_into().unwrap());
    Ok((name, seq, count))
}

pub fn pack_recovery_request(name: &StreamName, seq: u64, count: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(RECOVERY_REQUEST_LEN);
    buf.extend_from_slice(name);
    buf.put_u64(seq);
    buf.put_u16(count);
    buf.freeze()
}

// current_size == 0 means an empty batch, so the header hasn't been counted yet.
pub fn projected_packet_size(current_size: usize, next_message: &[u8]) -> usize {
    if current_size > 0 {
        current_size + LENGTH_PREFIX_LEN + next_message.len()
    } else {
        HEADER_LEN + LENGTH_PREFIX_LEN + next_message.len()
    }
}
