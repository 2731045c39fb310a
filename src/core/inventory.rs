//! Inventory vectors used by `inv`, `getdata` and `notfound`

use crate::wire::{read_i32, Decodable, DecodeError, Encodable, Hash256};
use bytes::BufMut;
use std::fmt;
use std::io::Read;

/// Kind of object an inventory entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvType {
    Error,
    Tx,
    Block,
    CompactBlock,
    /// Any value this node does not interpret, kept as received
    Other(i32),
}

impl InvType {
    pub fn as_i32(self) -> i32 {
        match self {
            InvType::Error => 0,
            InvType::Tx => 1,
            InvType::Block => 2,
            InvType::CompactBlock => 4,
            InvType::Other(v) => v,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => InvType::Error,
            1 => InvType::Tx,
            2 => InvType::Block,
            4 => InvType::CompactBlock,
            v => InvType::Other(v),
        }
    }
}

impl fmt::Display for InvType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvType::Error => write!(f, "Error"),
            InvType::Tx => write!(f, "TX"),
            InvType::Block => write!(f, "Block"),
            InvType::CompactBlock => write!(f, "CompactBlock"),
            InvType::Other(v) => write!(f, "Unknown({})", v),
        }
    }
}

/// A (type, hash) pair advertising or requesting one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inventory {
    pub inv_type: InvType,
    pub hash: Hash256,
}

impl Inventory {
    /// Encoded size of one entry
    pub const SIZE: usize = 4 + 32;

    pub fn new(inv_type: InvType, hash: Hash256) -> Self {
        Self { inv_type, hash }
    }

    pub fn tx(hash: Hash256) -> Self {
        Self::new(InvType::Tx, hash)
    }

    pub fn block(hash: Hash256) -> Self {
        Self::new(InvType::Block, hash)
    }

    /// How many entries fit in a payload of `max_payload_length` bytes,
    /// leaving room for the count prefix
    pub fn estimate_max_inv_elements(max_payload_length: u32) -> usize {
        (max_payload_length as usize).saturating_sub(8) / Self::SIZE
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Inventory(type={} hash={})", self.inv_type, self.hash)
    }
}

impl Encodable for Inventory {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(self.inv_type.as_i32());
        self.hash.encode(buf);
    }
}

impl Decodable for Inventory {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            inv_type: InvType::from_i32(read_i32(reader)?),
            hash: Hash256::decode(reader)?,
        })
    }
}
