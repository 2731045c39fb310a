//! BSV P2P node core: a Bitcoin SV peer protocol implementation in Rust
//!
//! This crate provides the pieces a test harness or light tool needs to
//! talk to Bitcoin SV nodes:
//! - Byte-exact wire codec for primitives, compact sizes and varints
//! - Transaction, block and address object model with cached hashes
//! - Complete P2P message catalog, including compact blocks and streams
//! - Framed connections with handshake and keepalive handling
//! - Merkle branch and partial-tree proof engine
//! - Random access block file loader
//!
//! # Example
//!
//! ```rust
//! use bsv_p2p_node::crypto::{create_merkle_branch, merkle_root, verify_merkle_branch};
//! use bsv_p2p_node::wire::Hash256;
//!
//! let txs: Vec<Hash256> = (1..=3u8).map(|i| Hash256::new([i; 32])).collect();
//! let root = merkle_root(&txs);
//! let branch = create_merkle_branch(&txs[2], &txs).unwrap();
//! assert!(verify_merkle_branch(&txs[2], &branch, &root));
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod wire;

// Re-export commonly used types
pub use crate::core::{Block, BlockHeader, Inventory, MerkleBlock, Transaction};
pub use crypto::{MerkleProofResult, MerkleTree};
pub use network::{
    ConnectionConfig, ConnectionRegistry, Message, Network, NodeCallbacks, NodeConnection,
};
pub use storage::{load_block_at_offset, BlockFile};
pub use wire::{Decodable, DecodeError, Encodable, Hash256};
