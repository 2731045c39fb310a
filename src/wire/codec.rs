//! Primitive encoders and decoders
//!
//! Everything on the wire is little-endian unless noted (ports are the
//! one big-endian field). Encoding goes through [`bytes::BufMut`] so the
//! same code writes into a `Vec<u8>` or straight into a connection's
//! `BytesMut` send buffer.

use bytes::BufMut;
use std::io::{self, Read};
use thiserror::Error;

/// Upper bound on elements reserved up-front when decoding a vector.
/// The count prefix comes from the peer, so the vector grows past this
/// only as elements actually decode.
pub const MAX_PREALLOC: usize = 4096;

/// Largest compact-size count accepted for a byte string or vector.
pub const MAX_ENCODED_LEN: u64 = 0x1_0000_0000;

// =============================================================================
// Errors
// =============================================================================

/// Wire decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Truncated input: needed {needed} more bytes")]
    Truncated { needed: usize },
    #[error("Length {len} exceeds limit for {what}")]
    Oversized { what: &'static str, len: u64 },
    #[error("Varint overflows 64 bits")]
    VarintOverflow,
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl DecodeError {
    /// True when the input ended mid-field and more bytes may fix it.
    pub fn is_truncated(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated { needed: 1 }
        } else {
            DecodeError::Io(e)
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Types with a deterministic wire encoding
pub trait Encodable {
    /// Append the encoding of `self` to `buf`
    fn encode<B: BufMut>(&self, buf: &mut B);

    /// Encode into a fresh byte vector
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Types that can be read back from their wire encoding
pub trait Decodable: Sized {
    /// Consume exactly one encoded value from `reader`
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError>;

    /// Decode from the front of a byte slice, ignoring any trailing bytes
    fn deserialize(data: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = data;
        Self::decode(&mut cursor)
    }
}

// =============================================================================
// Fixed-width integers
// =============================================================================

fn read_exact<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), DecodeError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated { needed: buf.len() }
        } else {
            DecodeError::Io(e)
        }
    })
}

/// Read a fixed-size byte array
pub fn read_array<const N: usize, R: Read + ?Sized>(reader: &mut R) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    read_exact(reader, &mut buf)?;
    Ok(buf)
}

pub fn read_u8<R: Read + ?Sized>(reader: &mut R) -> Result<u8, DecodeError> {
    Ok(read_array::<1, _>(reader)?[0])
}

/// Any non-zero byte reads as `true`
pub fn read_bool<R: Read + ?Sized>(reader: &mut R) -> Result<bool, DecodeError> {
    Ok(read_u8(reader)? != 0)
}

pub fn read_u16_be<R: Read + ?Sized>(reader: &mut R) -> Result<u16, DecodeError> {
    Ok(u16::from_be_bytes(read_array(reader)?))
}

pub fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32, DecodeError> {
    Ok(u32::from_le_bytes(read_array(reader)?))
}

pub fn read_i32<R: Read + ?Sized>(reader: &mut R) -> Result<i32, DecodeError> {
    Ok(i32::from_le_bytes(read_array(reader)?))
}

pub fn read_u64<R: Read + ?Sized>(reader: &mut R) -> Result<u64, DecodeError> {
    Ok(u64::from_le_bytes(read_array(reader)?))
}

pub fn read_i64<R: Read + ?Sized>(reader: &mut R) -> Result<i64, DecodeError> {
    Ok(i64::from_le_bytes(read_array(reader)?))
}

// =============================================================================
// Compact size
// =============================================================================

/// Write a compact-size integer
pub fn write_compact_size<B: BufMut>(buf: &mut B, value: u64) {
    match value {
        0..=0xFC => buf.put_u8(value as u8),
        0xFD..=0xFFFF => {
            buf.put_u8(0xFD);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.put_u8(0xFE);
            buf.put_u32_le(value as u32);
        }
        _ => {
            buf.put_u8(0xFF);
            buf.put_u64_le(value);
        }
    }
}

/// Number of bytes `write_compact_size` emits for `value`
pub fn compact_size_len(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Read a compact-size integer, dispatching on the marker byte
pub fn read_compact_size<R: Read + ?Sized>(reader: &mut R) -> Result<u64, DecodeError> {
    let marker = read_u8(reader)?;
    match marker {
        0xFD => Ok(u16::from_le_bytes(read_array(reader)?) as u64),
        0xFE => Ok(u32::from_le_bytes(read_array(reader)?) as u64),
        0xFF => Ok(u64::from_le_bytes(read_array(reader)?)),
        n => Ok(n as u64),
    }
}

fn read_length<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> Result<u64, DecodeError> {
    let len = read_compact_size(reader)?;
    if len > MAX_ENCODED_LEN {
        return Err(DecodeError::Oversized { what, len });
    }
    Ok(len)
}

// =============================================================================
// Varint
// =============================================================================

/// Write a base-128 varint.
///
/// Digits are produced least-significant first, every digit except the
/// first produced carries the continuation bit and has one subtracted
/// from the remaining value, then the sequence is emitted reversed.
pub fn write_varint<B: BufMut>(buf: &mut B, mut value: u64) {
    let mut digits = [0u8; 10];
    let mut len = 0;
    loop {
        digits[len] = (value & 0x7F) as u8 | if len > 0 { 0x80 } else { 0x00 };
        if value <= 0x7F {
            break;
        }
        value = (value >> 7) - 1;
        len += 1;
    }
    for digit in digits[..=len].iter().rev() {
        buf.put_u8(*digit);
    }
}

/// Read a base-128 varint written by [`write_varint`]
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> Result<u64, DecodeError> {
    let mut value: u64 = 0;
    loop {
        let byte = read_u8(reader)?;
        if value > (u64::MAX >> 7) {
            return Err(DecodeError::VarintOverflow);
        }
        value = (value << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        value = value.checked_add(1).ok_or(DecodeError::VarintOverflow)?;
    }
}

// =============================================================================
// Byte strings and vectors
// =============================================================================

/// Write compact-size length followed by raw bytes
pub fn write_var_bytes<B: BufMut>(buf: &mut B, data: &[u8]) {
    write_compact_size(buf, data.len() as u64);
    buf.put_slice(data);
}

/// Read a compact-size length followed by that many bytes
pub fn read_var_bytes<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>, DecodeError> {
    let len = read_length(reader, "byte string")?;
    let mut data = Vec::with_capacity((len as usize).min(MAX_PREALLOC * 64));
    let read = Read::take(&mut *reader, len).read_to_end(&mut data)?;
    if (read as u64) < len {
        return Err(DecodeError::Truncated {
            needed: (len - read as u64) as usize,
        });
    }
    Ok(data)
}

/// Read a length-prefixed UTF-8 string
pub fn read_var_string<R: Read + ?Sized>(reader: &mut R) -> Result<String, DecodeError> {
    String::from_utf8(read_var_bytes(reader)?).map_err(|_| DecodeError::InvalidUtf8)
}

/// Write compact-size count followed by each element's own encoding
pub fn write_vec<B: BufMut, T: Encodable>(buf: &mut B, items: &[T]) {
    write_compact_size(buf, items.len() as u64);
    for item in items {
        item.encode(buf);
    }
}

/// Read compact-size count followed by that many elements
pub fn read_vec<R: Read + ?Sized, T: Decodable>(reader: &mut R) -> Result<Vec<T>, DecodeError> {
    let count = read_length(reader, "vector")?;
    let mut items = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
    for _ in 0..count {
        items.push(T::decode(reader)?);
    }
    Ok(items)
}

impl<T: Encodable> Encodable for Vec<T> {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        write_vec(buf, self);
    }
}

impl<T: Decodable> Decodable for Vec<T> {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        read_vec(reader)
    }
}

impl Encodable for i32 {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(*self);
    }
}

impl Decodable for i32 {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        read_i32(reader)
    }
}

/// Length-prefixed byte string as a vector element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VarBytes(pub Vec<u8>);

impl Encodable for VarBytes {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        write_var_bytes(buf, &self.0);
    }
}

impl Decodable for VarBytes {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(VarBytes(read_var_bytes(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_compact_size(&mut buf, value);
        buf
    }

    #[test]
    fn test_compact_size_boundaries() {
        let cases: [(u64, u8, usize); 6] = [
            (252, 252, 1),
            (253, 0xFD, 3),
            (65535, 0xFD, 3),
            (65536, 0xFE, 5),
            (0xFFFF_FFFF, 0xFE, 5),
            (0x1_0000_0000, 0xFF, 9),
        ];

        for (value, marker, width) in cases {
            let encoded = compact(value);
            assert_eq!(encoded[0], marker, "marker for {}", value);
            assert_eq!(encoded.len(), width, "width for {}", value);
            assert_eq!(compact_size_len(value), width);

            let decoded = read_compact_size(&mut encoded.as_slice()).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_compact_size_truncated() {
        let encoded = compact(65536);
        let err = read_compact_size(&mut &encoded[..3]).unwrap_err();
        assert!(err.is_truncated());

        let err = read_compact_size(&mut &[][..]).unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn test_compact_size_reads_exact_width() {
        let mut data = compact(300);
        data.extend_from_slice(&[0xAA, 0xBB]);
        let mut cursor = data.as_slice();
        assert_eq!(read_compact_size(&mut cursor).unwrap(), 300);
        assert_eq!(cursor, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_varint_known_encodings() {
        let cases: [(u64, &[u8]); 5] = [
            (0, &[0x00]),
            (0x7F, &[0x7F]),
            (0x80, &[0x80, 0x00]),
            (0x407F, &[0xFF, 0x7F]),
            (0x4080, &[0x80, 0x80, 0x00]),
        ];

        for (value, expected) in cases {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert_eq!(buf, expected, "encoding of {:#x}", value);
            assert_eq!(read_varint(&mut buf.as_slice()).unwrap(), value);
        }
    }

    #[test]
    fn test_varint_extremes() {
        for value in [1u64, 1_000_000, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert_eq!(read_varint(&mut buf.as_slice()).unwrap(), value);
        }
    }

    #[test]
    fn test_varint_overflow_rejected() {
        let data = [0xFFu8; 11];
        let err = read_varint(&mut &data[..]).unwrap_err();
        assert!(matches!(err, DecodeError::VarintOverflow));
    }

    #[test]
    fn test_var_bytes() {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, b"hello world");
        assert_eq!(buf[0], 11);

        let decoded = read_var_bytes(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn test_var_bytes_truncated_payload() {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, b"hello world");
        let err = read_var_bytes(&mut &buf[..6]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { needed: 6 }));
    }

    #[test]
    fn test_int_vector() {
        let values: Vec<i32> = vec![-1, 0, 7, i32::MAX];
        let encoded = values.serialize();
        assert_eq!(encoded.len(), 1 + 4 * 4);
        assert_eq!(Vec::<i32>::deserialize(&encoded).unwrap(), values);
    }

    #[test]
    fn test_string_vector() {
        let values = vec![VarBytes(b"a".to_vec()), VarBytes(Vec::new())];
        let encoded = values.serialize();
        assert_eq!(encoded, vec![2, 1, b'a', 0]);
        assert_eq!(Vec::<VarBytes>::deserialize(&encoded).unwrap(), values);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, &[0xFF, 0xFE]);
        assert!(matches!(
            read_var_string(&mut buf.as_slice()),
            Err(DecodeError::InvalidUtf8)
        ));
    }
}
