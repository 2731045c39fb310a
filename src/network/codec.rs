//! Frame codec
//!
//! `magic(4) | command(12) | length(4) | [checksum(4)] | payload`.
//! The checksum is present once the wire version in each direction
//! reaches 209, so the codec tracks the send and receive versions
//! separately.

use super::config::Network;
use super::connection::ConnectionError;
use super::message::Message;
use crate::core::consensus::{CHECKSUM_VERSION, INITIAL_WIRE_VERSION, READ_BUFFER_SIZE};
use crate::crypto::checksum;
use crate::wire::Encodable;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Width of the NUL-padded command field
pub const COMMAND_SIZE: usize = 12;

/// Payload lengths are signed 32-bit on the wire
pub const MAX_FRAME_PAYLOAD: u32 = i32::MAX as u32;

const MAGIC_SIZE: usize = 4;
const LENGTH_SIZE: usize = 4;
const CHECKSUM_SIZE: usize = 4;

/// Codec between framed bytes and [`Message`]s for one connection
#[derive(Debug, Clone)]
pub struct FrameCodec {
    magic: [u8; 4],
    send_version: i32,
    recv_version: i32,
    legacy_ping: bool,
}

impl FrameCodec {
    pub fn new(network: Network) -> Self {
        Self {
            magic: network.magic(),
            send_version: INITIAL_WIRE_VERSION,
            recv_version: INITIAL_WIRE_VERSION,
            legacy_ping: false,
        }
    }

    pub fn send_version(&self) -> i32 {
        self.send_version
    }

    pub fn set_send_version(&mut self, version: i32) {
        self.send_version = version;
    }

    pub fn recv_version(&self) -> i32 {
        self.recv_version
    }

    pub fn set_recv_version(&mut self, version: i32) {
        self.recv_version = version;
    }

    /// Read `ping` payloads without a nonce
    pub fn set_legacy_ping(&mut self, legacy: bool) {
        self.legacy_ping = legacy;
    }

    pub fn legacy_ping(&self) -> bool {
        self.legacy_ping
    }

    fn header_len(version: i32) -> usize {
        let base = MAGIC_SIZE + COMMAND_SIZE + LENGTH_SIZE;
        if version >= CHECKSUM_VERSION {
            base + CHECKSUM_SIZE
        } else {
            base
        }
    }
}

fn parse_command(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = ConnectionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MAGIC_SIZE {
            return Ok(None);
        }
        if src[..MAGIC_SIZE] != self.magic {
            return Err(ConnectionError::BadMagic);
        }

        let header_len = Self::header_len(self.recv_version);
        if src.len() < header_len {
            return Ok(None);
        }

        let command = parse_command(&src[MAGIC_SIZE..MAGIC_SIZE + COMMAND_SIZE]);
        let len_at = MAGIC_SIZE + COMMAND_SIZE;
        let len = u32::from_le_bytes([src[len_at], src[len_at + 1], src[len_at + 2], src[len_at + 3]]);
        if len > MAX_FRAME_PAYLOAD {
            return Err(ConnectionError::PayloadTooLarge(len));
        }

        let len = len as usize;
        if src.len() < header_len + len {
            // The claimed length is untrusted; grow one read at a time
            src.reserve((header_len + len - src.len()).min(READ_BUFFER_SIZE));
            return Ok(None);
        }

        let expected = if header_len > len_at + LENGTH_SIZE {
            let at = len_at + LENGTH_SIZE;
            Some([src[at], src[at + 1], src[at + 2], src[at + 3]])
        } else {
            None
        };

        src.advance(header_len);
        let payload = src.split_to(len);

        if let Some(expected) = expected {
            if checksum(&payload) != expected {
                return Err(ConnectionError::BadChecksum);
            }
        }

        match Message::decode_payload(&command, &payload, self.legacy_ping)? {
            Some(msg) => Ok(Some(msg)),
            None => Err(ConnectionError::UnknownCommand(command)),
        }
    }
}

impl<'a> Encoder<&'a Message> for FrameCodec {
    type Error = ConnectionError;

    fn encode(&mut self, item: &'a Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = Encodable::serialize(item);
        if payload.len() > MAX_FRAME_PAYLOAD as usize {
            return Err(ConnectionError::PayloadTooLarge(payload.len() as u32));
        }

        let mut command = [0u8; COMMAND_SIZE];
        let name = item.command().as_bytes();
        command[..name.len()].copy_from_slice(name);

        dst.reserve(Self::header_len(self.send_version) + payload.len());
        dst.put_slice(&self.magic);
        dst.put_slice(&command);
        dst.put_u32_le(payload.len() as u32);
        if self.send_version >= CHECKSUM_VERSION {
            dst.put_slice(&checksum(&payload));
        }
        dst.put_slice(&payload);
        Ok(())
    }
}
