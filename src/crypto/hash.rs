//! SHA-256 based digests used for object identity and framing
//!
//! Identity hashes are `sha256(sha256(bytes))` kept in internal byte
//! order; only their display form is reversed.

use crate::wire::Hash256;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes SHA-256 of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Computes double SHA-256 (SHA-256 of SHA-256)
pub fn double_sha256(data: &[u8]) -> Hash256 {
    Hash256(sha256(&sha256(data)))
}

/// Double SHA-256 of two concatenated hashes, the Merkle parent step
pub fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    let first: [u8; 32] = hasher.finalize().into();
    Hash256(sha256(&first))
}

/// First four bytes of `double_sha256(payload)`
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest.as_bytes()[..4]);
    out
}

/// RIPEMD-160 of SHA-256, the address hash
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}
