//! Session-level protocol objects: protocol configuration, alerts and
//! double-spend callback descriptors

use super::consensus::{MAX_PROTOCOL_RECV_PAYLOAD_LENGTH, STREAM_POLICIES};
use crate::wire::{
    read_compact_size, read_i32, read_i64, read_u32, read_u8, read_var_bytes, read_varint,
    read_vec, write_compact_size, write_var_bytes, write_varint, write_vec, Decodable,
    DecodeError, Encodable, VarBytes,
};
use bytes::BufMut;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

// =============================================================================
// Protoconf
// =============================================================================

/// Protocol configuration advertised after the handshake.
///
/// `number_of_fields` governs which trailing fields are on the wire:
/// stream policies only travel when it exceeds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protoconf {
    pub number_of_fields: u64,
    pub max_recv_payload_length: u32,
    pub stream_policies: Vec<u8>,
}

impl Protoconf {
    pub fn new(number_of_fields: u64, max_recv_payload_length: u32, stream_policies: &[u8]) -> Self {
        Self {
            number_of_fields,
            max_recv_payload_length,
            stream_policies: stream_policies.to_vec(),
        }
    }

    /// The configuration this node advertises
    pub fn local() -> Self {
        Self::new(2, MAX_PROTOCOL_RECV_PAYLOAD_LENGTH, STREAM_POLICIES.as_bytes())
    }
}

impl Default for Protoconf {
    fn default() -> Self {
        Self::new(2, MAX_PROTOCOL_RECV_PAYLOAD_LENGTH, b"Default")
    }
}

impl Encodable for Protoconf {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        write_compact_size(buf, self.number_of_fields);
        buf.put_u32_le(self.max_recv_payload_length);
        if self.number_of_fields > 1 {
            write_var_bytes(buf, &self.stream_policies);
        }
    }
}

impl Decodable for Protoconf {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        let number_of_fields = read_compact_size(reader)?;
        let max_recv_payload_length = read_u32(reader)?;
        let stream_policies = if number_of_fields > 1 {
            read_var_bytes(reader)?
        } else {
            Vec::new()
        };
        Ok(Self {
            number_of_fields,
            max_recv_payload_length,
            stream_policies,
        })
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Signed alert envelope
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alert {
    /// Serialized [`UnsignedAlert`]
    pub message: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Alert {
    pub fn unsigned(&self) -> Result<UnsignedAlert, DecodeError> {
        UnsignedAlert::deserialize(&self.message)
    }
}

impl Encodable for Alert {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        write_var_bytes(buf, &self.message);
        write_var_bytes(buf, &self.signature);
    }
}

impl Decodable for Alert {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            message: read_var_bytes(reader)?,
            signature: read_var_bytes(reader)?,
        })
    }
}

/// Alert body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedAlert {
    pub version: i32,
    pub relay_until: i64,
    pub expiration: i64,
    pub id: i32,
    pub cancel: i32,
    pub set_cancel: Vec<i32>,
    pub min_ver: i32,
    pub max_ver: i32,
    pub set_sub_ver: Vec<VarBytes>,
    pub priority: i32,
    pub comment: Vec<u8>,
    pub status_bar: Vec<u8>,
    pub reserved: Vec<u8>,
}

impl Default for UnsignedAlert {
    fn default() -> Self {
        Self {
            version: 1,
            relay_until: 0,
            expiration: 0,
            id: 0,
            cancel: 0,
            set_cancel: Vec::new(),
            min_ver: 0,
            max_ver: 0,
            set_sub_ver: Vec::new(),
            priority: 0,
            comment: Vec::new(),
            status_bar: Vec::new(),
            reserved: Vec::new(),
        }
    }
}

impl Encodable for UnsignedAlert {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(self.version);
        buf.put_i64_le(self.relay_until);
        buf.put_i64_le(self.expiration);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.cancel);
        write_vec(buf, &self.set_cancel);
        buf.put_i32_le(self.min_ver);
        buf.put_i32_le(self.max_ver);
        write_vec(buf, &self.set_sub_ver);
        buf.put_i32_le(self.priority);
        write_var_bytes(buf, &self.comment);
        write_var_bytes(buf, &self.status_bar);
        write_var_bytes(buf, &self.reserved);
    }
}

impl Decodable for UnsignedAlert {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            version: read_i32(reader)?,
            relay_until: read_i64(reader)?,
            expiration: read_i64(reader)?,
            id: read_i32(reader)?,
            cancel: read_i32(reader)?,
            set_cancel: read_vec(reader)?,
            min_ver: read_i32(reader)?,
            max_ver: read_i32(reader)?,
            set_sub_ver: read_vec(reader)?,
            priority: read_i32(reader)?,
            comment: read_var_bytes(reader)?,
            status_bar: read_var_bytes(reader)?,
            reserved: read_var_bytes(reader)?,
        })
    }
}

// =============================================================================
// Callback Message
// =============================================================================

/// Descriptor telling a double-spend notifier where to call back and
/// which inputs to watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackMessage {
    /// [`CallbackMessage::IPV6_VERSION`] selects 16-byte addresses
    pub version: u8,
    pub ip_addresses: Vec<IpAddr>,
    pub inputs: Vec<u64>,
}

impl CallbackMessage {
    pub const IPV4_VERSION: u8 = 1;
    pub const IPV6_VERSION: u8 = 129;

    pub fn new(version: u8, ip_addresses: Vec<IpAddr>, inputs: Vec<u64>) -> Self {
        Self {
            version,
            ip_addresses,
            inputs,
        }
    }

    fn is_ipv6(&self) -> bool {
        self.version == Self::IPV6_VERSION
    }
}

impl Default for CallbackMessage {
    fn default() -> Self {
        Self::new(
            Self::IPV4_VERSION,
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            vec![0],
        )
    }
}

impl Encodable for CallbackMessage {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.version);
        write_compact_size(buf, self.ip_addresses.len() as u64);
        for ip in &self.ip_addresses {
            match (self.is_ipv6(), ip) {
                (true, IpAddr::V6(v6)) => buf.put_slice(&v6.octets()),
                (true, IpAddr::V4(v4)) => buf.put_slice(&v4.to_ipv6_mapped().octets()),
                (false, IpAddr::V4(v4)) => buf.put_slice(&v4.octets()),
                // Only addresses that fit four bytes survive an IPv4 descriptor
                (false, IpAddr::V6(v6)) => {
                    let v4 = v6.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED);
                    buf.put_slice(&v4.octets());
                }
            }
        }
        write_varint(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            write_varint(buf, *input);
        }
    }
}

impl Decodable for CallbackMessage {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        let version = read_u8(reader)?;
        let count = read_compact_size(reader)?;
        let mut ip_addresses = Vec::new();
        for _ in 0..count {
            let ip = if version == Self::IPV6_VERSION {
                IpAddr::V6(Ipv6Addr::from(crate::wire::read_array::<16, _>(reader)?))
            } else {
                IpAddr::V4(Ipv4Addr::from(crate::wire::read_array::<4, _>(reader)?))
            };
            ip_addresses.push(ip);
        }

        let input_count = read_varint(reader)?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(read_varint(reader)?);
        }
        Ok(Self {
            version,
            ip_addresses,
            inputs,
        })
    }
}
