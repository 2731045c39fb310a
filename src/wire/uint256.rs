//! 256-bit values: hashes and proof-of-work targets

use super::codec::{read_array, Decodable, DecodeError, Encodable};
use bytes::BufMut;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// 256-bit value stored as 32 little-endian bytes.
///
/// This is the wire and numeric form: byte 0 is the least significant,
/// which on the wire is the same as eight little-endian u32 words with
/// the lowest word first. Only the hex rendering is reversed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zero value
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Create from a 32-byte slice in internal order
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 32] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex in display order (most significant byte first)
    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parse display-order hex
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes: [u8; 32] = hex::decode(s)?
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Little-endian 64-bit word `i` (0 is least significant)
    pub fn word64(&self, i: usize) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.0[i * 8..i * 8 + 8]);
        u64::from_le_bytes(word)
    }

    /// Expand a compact target (`bits`) to its full 256-bit value.
    ///
    /// Returns `None` for negative or overflowing encodings, which no
    /// hash can satisfy.
    pub fn from_compact(bits: u32) -> Option<Self> {
        let size = (bits >> 24) as usize;
        let mut mantissa = bits & 0x007F_FFFF;
        if mantissa != 0 && bits & 0x0080_0000 != 0 {
            return None;
        }

        let mut target = [0u8; 32];
        if size <= 3 {
            mantissa >>= 8 * (3 - size) as u32;
            target[..4].copy_from_slice(&mantissa.to_le_bytes());
            return Some(Self(target));
        }

        for (i, byte) in mantissa.to_le_bytes()[..3].iter().enumerate() {
            let pos = size - 3 + i;
            if pos >= 32 {
                if *byte != 0 {
                    return None;
                }
                continue;
            }
            target[pos] = *byte;
        }
        Some(Self(target))
    }
}

impl Ord for Hash256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Encodable for Hash256 {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.0);
    }
}

impl Decodable for Hash256 {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self(read_array(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_is_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        bytes[31] = 0xAB;
        let hash = Hash256::new(bytes);

        let hex = hash.to_hex();
        assert!(hex.starts_with("ab"));
        assert!(hex.ends_with("01"));
        assert_eq!(Hash256::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_from_hex_rejects_bad_length() {
        assert!(Hash256::from_hex("abcd").is_err());
        assert!(Hash256::from_hex("zz").is_err());
    }

    #[test]
    fn test_numeric_ordering() {
        let mut low = [0u8; 32];
        low[0] = 0xFF;
        let mut high = [0u8; 32];
        high[31] = 0x01;
        assert!(Hash256(low) < Hash256(high));
    }

    #[test]
    fn test_from_compact_genesis_bits() {
        let target = Hash256::from_compact(0x1d00ffff).unwrap();
        assert_eq!(
            target.to_hex(),
            "00000000ffff0000000000000000000000000000000000000000000000000000"
        );

        let genesis = Hash256::from_hex(
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
        )
        .unwrap();
        assert!(genesis <= target);
    }

    #[test]
    fn test_from_compact_small_and_invalid() {
        let target = Hash256::from_compact(0x0112_3456).unwrap();
        assert_eq!(target.word64(0), 0x12);

        assert!(Hash256::from_compact(0x0492_3456).is_none());
        assert!(Hash256::from_compact(0xff12_3456).is_none());
    }

    #[test]
    fn test_wire_encoding_is_internal_order() {
        let hash = Hash256::new([7u8; 32]);
        let encoded = Encodable::serialize(&hash);
        assert_eq!(encoded, vec![7u8; 32]);
        assert_eq!(<Hash256 as Decodable>::deserialize(&encoded).unwrap(), hash);
    }

    #[test]
    fn test_serde_uses_display_hex() {
        let hash = Hash256::from_hex(
            "d3dc8224dc896986cebb8bf78cb658c8ca7b85c1b99077d835dee5f81424e7b9",
        )
        .unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(
            json,
            "\"d3dc8224dc896986cebb8bf78cb658c8ca7b85c1b99077d835dee5f81424e7b9\""
        );
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
