//! Wire codec for the peer-to-peer protocol
//!
//! This module provides:
//! - Compact-size integers (1/3/5/9 bytes by magnitude)
//! - The secondary base-128 varint used by flag and short-ID contexts
//! - Length-prefixed byte strings and homogeneous vectors
//! - The 256-bit value type shared by hashes and proof-of-work targets
//!
//! Decoding reads from any [`std::io::Read`] and never consumes more bytes
//! than the decoded value occupies. A read that runs out of input reports
//! [`DecodeError::Truncated`], which streaming callers treat as
//! "wait for more data" rather than as corruption.

pub mod codec;
pub mod uint256;

pub use codec::{
    compact_size_len, read_array, read_bool, read_compact_size, read_i32, read_i64, read_u16_be,
    read_u32, read_u64, read_u8, read_var_bytes, read_var_string, read_varint, read_vec,
    write_compact_size, write_var_bytes, write_varint, write_vec, Decodable, DecodeError,
    Encodable, VarBytes, MAX_ENCODED_LEN, MAX_PREALLOC,
};
pub use uint256::Hash256;
