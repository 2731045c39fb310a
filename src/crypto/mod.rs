//! Cryptographic primitives for the node
//!
//! This module provides:
//! - SHA-256, double SHA-256 and HASH160 digests
//! - SipHash-2-4 over 256-bit values for compact-block short IDs
//! - Merkle root computation, inclusion branches and partial trees

pub mod hash;
pub mod merkle;
pub mod siphash;

pub use hash::{checksum, double_sha256, hash160, hash_pair, sha256};
pub use merkle::{
    bit_field_to_bytes, branch_root, bytes_to_bit_field, create_merkle_branch, merkle_root,
    verify_merkle_branch, BranchEntry, MerkleProofResult, MerkleTree, PartialTreeMatch,
    ProofError, Side,
};
pub use siphash::siphash256;
