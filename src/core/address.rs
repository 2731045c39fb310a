//! Peer addresses, service flags and association identifiers

use crate::wire::{read_array, read_u16_be, read_u32, read_u64, read_var_bytes, write_var_bytes};
use crate::wire::{Decodable, DecodeError, Encodable};
use bitflags::bitflags;
use bytes::BufMut;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

bitflags! {
    /// Services a node advertises; unknown bits are kept as received
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ServiceFlags: u64 {
        const NETWORK = 1 << 0;
        /// BIP 64
        const GETUTXO = 1 << 1;
        const BLOOM = 1 << 2;
        const WITNESS = 1 << 3;
        const XTHIN = 1 << 4;
        const BITCOIN_CASH = 1 << 5;
    }
}

impl Default for ServiceFlags {
    fn default() -> Self {
        ServiceFlags::NETWORK
    }
}

fn encode_ip<B: BufMut>(buf: &mut B, ip: &IpAddr) {
    let octets = match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    };
    buf.put_slice(&octets);
}

fn decode_ip<R: Read + ?Sized>(reader: &mut R) -> Result<IpAddr, DecodeError> {
    let v6 = Ipv6Addr::from(read_array::<16, _>(reader)?);
    Ok(match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    })
}

// =============================================================================
// Addresses
// =============================================================================

/// Address as carried in `version`: no timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionAddress {
    pub services: ServiceFlags,
    pub ip: IpAddr,
    pub port: u16,
}

impl VersionAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            services: ServiceFlags::NETWORK,
            ip,
            port,
        }
    }
}

impl Default for VersionAddress {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    }
}

impl fmt::Display for VersionAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl Encodable for VersionAddress {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u64_le(self.services.bits());
        encode_ip(buf, &self.ip);
        buf.put_u16(self.port);
    }
}

impl Decodable for VersionAddress {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            services: ServiceFlags::from_bits_retain(read_u64(reader)?),
            ip: decode_ip(reader)?,
            port: read_u16_be(reader)?,
        })
    }
}

/// Address as carried in `addr`: prefixed with a last-seen time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    /// Unix seconds
    pub time: u32,
    pub services: ServiceFlags,
    pub ip: IpAddr,
    pub port: u16,
}

impl Address {
    pub fn new(time: u32, ip: IpAddr, port: u16) -> Self {
        Self {
            time,
            services: ServiceFlags::NETWORK,
            ip,
            port,
        }
    }
}

impl Encodable for Address {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.time);
        buf.put_u64_le(self.services.bits());
        encode_ip(buf, &self.ip);
        buf.put_u16(self.port);
    }
}

impl Decodable for Address {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            time: read_u32(reader)?,
            services: ServiceFlags::from_bits_retain(read_u64(reader)?),
            ip: decode_ip(reader)?,
            port: read_u16_be(reader)?,
        })
    }
}

// =============================================================================
// Association ID
// =============================================================================

/// Type byte for a UUID association id
const ASSOC_ID_UUID: u8 = 0;

/// 128-bit token grouping several streams into one peer session
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationId(pub [u8; 16]);

impl AssociationId {
    /// Random version-4 UUID
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    /// Parse the blob form: one type byte followed by the 16 id bytes
    pub fn from_blob(blob: &[u8]) -> Option<Self> {
        let (kind, rest) = blob.split_first()?;
        if *kind != ASSOC_ID_UUID {
            return None;
        }
        Some(Self(rest.try_into().ok()?))
    }

    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(17);
        blob.push(ASSOC_ID_UUID);
        blob.extend_from_slice(&self.0);
        blob
    }

    /// Length-prefixed blob, or nothing at all when absent
    pub fn encode_optional<B: BufMut>(id: &Option<Self>, buf: &mut B) {
        if let Some(id) = id {
            write_var_bytes(buf, &id.to_blob());
        }
    }

    /// Read a length-prefixed blob; an empty or unparseable one is `None`
    pub fn decode_blob<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Self>, DecodeError> {
        Ok(Self::from_blob(&read_var_bytes(reader)?))
    }
}

impl fmt::Display for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }
}

impl fmt::Debug for AssociationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AssociationId({})", self)
    }
}

/// Stream kinds negotiated by `createstrm`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamType {
    Unknown = 0,
    General = 1,
    Data1 = 2,
    Data2 = 3,
    Data3 = 4,
    Data4 = 5,
}

impl StreamType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StreamType::Unknown),
            1 => Some(StreamType::General),
            2 => Some(StreamType::Data1),
            3 => Some(StreamType::Data2),
            4 => Some(StreamType::Data3),
            5 => Some(StreamType::Data4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_address_layout() {
        let addr = VersionAddress::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 18444);
        let encoded = addr.serialize();
        assert_eq!(encoded.len(), 26);
        assert_eq!(&encoded[..8], &1u64.to_le_bytes());
        assert_eq!(&encoded[8..18], &[0u8; 10]);
        assert_eq!(&encoded[18..20], &[0xFF, 0xFF]);
        assert_eq!(&encoded[20..24], &[127, 0, 0, 1]);
        assert_eq!(&encoded[24..], &18444u16.to_be_bytes());
        assert_eq!(VersionAddress::deserialize(&encoded).unwrap(), addr);
    }

    #[test]
    fn test_timestamped_address() {
        let mut addr = Address::new(1_600_000_000, IpAddr::V6(Ipv6Addr::LOCALHOST), 8333);
        addr.services = ServiceFlags::NETWORK | ServiceFlags::BITCOIN_CASH;
        let encoded = addr.serialize();
        assert_eq!(encoded.len(), 30);
        assert_eq!(Address::deserialize(&encoded).unwrap(), addr);
    }

    #[test]
    fn test_unknown_service_bits_retained() {
        let mut encoded = VersionAddress::default().serialize();
        encoded[..8].copy_from_slice(&(1u64 << 10 | 1).to_le_bytes());
        let addr = VersionAddress::deserialize(&encoded).unwrap();
        assert!(addr.services.contains(ServiceFlags::NETWORK));
        assert_eq!(addr.services.bits(), 1 << 10 | 1);
    }

    #[test]
    fn test_association_id_blob() {
        let id = AssociationId::random();
        let blob = id.to_blob();
        assert_eq!(blob.len(), 17);
        assert_eq!(blob[0], 0);
        assert_eq!(AssociationId::from_blob(&blob), Some(id));

        assert_eq!(AssociationId::from_blob(&[]), None);
        assert_eq!(AssociationId::from_blob(&blob[..10]), None);

        let mut buf = Vec::new();
        AssociationId::encode_optional(&None, &mut buf);
        assert!(buf.is_empty());
        AssociationId::encode_optional(&Some(id), &mut buf);
        assert_eq!(buf[0], 17);
        assert_eq!(
            AssociationId::decode_blob(&mut buf.as_slice()).unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_association_id_display() {
        let id = AssociationId([0xAB; 16]);
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.matches('-').count(), 4);
    }

    #[test]
    fn test_stream_type_values() {
        assert_eq!(StreamType::from_u8(5), Some(StreamType::Data4));
        assert_eq!(StreamType::General as u8, 1);
        assert_eq!(StreamType::from_u8(6), None);
    }
}
