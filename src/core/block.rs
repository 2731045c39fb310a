//! Block headers, blocks and block locators
//!
//! Like transactions, headers cache their hash and never refresh it on
//! mutation; [`BlockHeader::rehash`] is the only way to update it.

use super::transaction::{Transaction, TransactionSummary};
use crate::crypto::{double_sha256, merkle_root};
use crate::wire::{
    read_i32, read_u32, read_vec, write_vec, Decodable, DecodeError, Encodable, Hash256,
};
use bytes::BufMut;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Serialized header size in bytes
pub const BLOCK_HEADER_SIZE: usize = 80;

// =============================================================================
// Block Header
// =============================================================================

/// Block header with a lazily cached identity hash
#[derive(Debug, Clone)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    /// Unix seconds
    pub time: u32,
    /// Compact proof-of-work target
    pub bits: u32,
    pub nonce: u32,
    hash: Option<Hash256>,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self::new(1, Hash256::zero(), Hash256::zero(), 0, 0, 0)
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.prev_block == other.prev_block
            && self.merkle_root == other.merkle_root
            && self.time == other.time
            && self.bits == other.bits
            && self.nonce == other.nonce
    }
}

impl Eq for BlockHeader {}

impl BlockHeader {
    pub fn new(
        version: i32,
        prev_block: Hash256,
        merkle_root: Hash256,
        time: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            prev_block,
            merkle_root,
            time,
            bits,
            nonce,
            hash: None,
        }
    }

    pub fn compute_hash(&self) -> Hash256 {
        double_sha256(&self.serialize())
    }

    /// Cached identity hash, computing it on first use
    pub fn hash(&mut self) -> Hash256 {
        match self.hash {
            Some(hash) => hash,
            None => {
                let hash = self.compute_hash();
                self.hash = Some(hash);
                hash
            }
        }
    }

    pub fn cached_hash(&self) -> Option<Hash256> {
        self.hash
    }

    /// Drop the cached hash and compute it again
    pub fn rehash(&mut self) -> Hash256 {
        self.hash = None;
        self.hash()
    }

    /// Header hash does not exceed the target encoded in `bits`
    pub fn meets_target(&mut self) -> bool {
        match Hash256::from_compact(self.bits) {
            Some(target) => self.hash() <= target,
            None => false,
        }
    }

    pub fn summary(&self) -> HeaderSummary {
        HeaderSummary {
            hash: self.hash.unwrap_or_else(|| self.compute_hash()),
            version: format!("{:08x}", self.version),
            prev_block: self.prev_block,
            merkle_root: self.merkle_root,
            time: DateTime::<Utc>::from_timestamp(self.time as i64, 0)
                .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
                .unwrap_or_default(),
            bits: format!("{:08x}", self.bits),
            nonce: format!("{:08x}", self.nonce),
        }
    }
}

impl Encodable for BlockHeader {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(self.version);
        self.prev_block.encode(buf);
        self.merkle_root.encode(buf);
        buf.put_u32_le(self.time);
        buf.put_u32_le(self.bits);
        buf.put_u32_le(self.nonce);
    }
}

impl Decodable for BlockHeader {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self::new(
            read_i32(reader)?,
            Hash256::decode(reader)?,
            Hash256::decode(reader)?,
            read_u32(reader)?,
            read_u32(reader)?,
            read_u32(reader)?,
        ))
    }
}

// =============================================================================
// Block
// =============================================================================

/// A header plus its ordered transactions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, txs: Vec<Transaction>) -> Self {
        Self { header, txs }
    }

    /// Cached header hash
    pub fn hash(&mut self) -> Hash256 {
        self.header.hash()
    }

    /// Recompute the header hash and every transaction hash
    pub fn rehash(&mut self) -> Hash256 {
        for tx in &mut self.txs {
            tx.rehash();
        }
        self.header.rehash()
    }

    /// Transaction hashes in block order, using cached values where present
    pub fn tx_hashes(&mut self) -> Vec<Hash256> {
        self.txs.iter_mut().map(Transaction::hash).collect()
    }

    /// Merkle root over the transactions' identity hashes
    pub fn calc_merkle_root(&mut self) -> Hash256 {
        merkle_root(&self.tx_hashes())
    }

    /// Proof of work, every transaction and the Merkle root all check out
    pub fn is_valid(&mut self) -> bool {
        if !self.header.meets_target() {
            return false;
        }
        if !self.txs.iter_mut().all(Transaction::is_valid) {
            return false;
        }
        self.calc_merkle_root() == self.header.merkle_root
    }

    /// Header with the block's cached hash carried over
    pub fn to_header(&self) -> BlockHeader {
        self.header.clone()
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            header: self.header.summary(),
            transactions: self
                .txs
                .iter()
                .map(|tx| tx.cached_hash().unwrap_or_else(|| tx.compute_hash()))
                .collect(),
        }
    }

    /// Full JSON view including every transaction
    pub fn transaction_summaries(&self) -> Vec<TransactionSummary> {
        self.txs.iter().map(Transaction::summary).collect()
    }
}

impl Encodable for Block {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.header.encode(buf);
        write_vec(buf, &self.txs);
    }
}

impl Decodable for Block {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            header: BlockHeader::decode(reader)?,
            txs: read_vec(reader)?,
        })
    }
}

// =============================================================================
// Block Locator
// =============================================================================

/// Sparse list of known block hashes, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocator {
    pub version: i32,
    pub have: Vec<Hash256>,
}

impl BlockLocator {
    pub fn new(version: i32, have: Vec<Hash256>) -> Self {
        Self { version, have }
    }
}

impl Default for BlockLocator {
    fn default() -> Self {
        Self::new(super::consensus::MY_VERSION, Vec::new())
    }
}

impl Encodable for BlockLocator {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(self.version);
        write_vec(buf, &self.have);
    }
}

impl Decodable for BlockLocator {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            version: read_i32(reader)?,
            have: read_vec(reader)?,
        })
    }
}

// =============================================================================
// Summaries
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderSummary {
    pub hash: Hash256,
    pub version: String,
    #[serde(rename = "hashPrevBlock")]
    pub prev_block: Hash256,
    #[serde(rename = "hashMerkleRoot")]
    pub merkle_root: Hash256,
    #[serde(rename = "nTime")]
    pub time: String,
    #[serde(rename = "nBits")]
    pub bits: String,
    #[serde(rename = "nNonce")]
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    pub header: HeaderSummary,
    pub transactions: Vec<Hash256>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{OutPoint, TxIn, TxOut};

    // Mainnet genesis block
    const GENESIS_HEX: &str = "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c0101000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

    const GENESIS_HASH: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

    fn genesis() -> Block {
        Block::deserialize(&hex::decode(GENESIS_HEX).unwrap()).unwrap()
    }

    #[test]
    fn test_genesis_decodes_and_hashes() {
        let mut block = genesis();
        assert_eq!(block.txs.len(), 1);
        assert_eq!(block.hash().to_hex(), GENESIS_HASH);
        assert_eq!(block.header.bits, 0x1d00ffff);
        assert_eq!(
            block.header.merkle_root.to_hex(),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
    }

    #[test]
    fn test_genesis_is_valid() {
        let mut block = genesis();
        assert!(block.is_valid());
        assert_eq!(block.calc_merkle_root(), block.header.merkle_root);
    }

    #[test]
    fn test_genesis_round_trip() {
        let block = genesis();
        assert_eq!(hex::encode(block.serialize()), GENESIS_HEX);
        assert_eq!(block.header.serialize().len(), BLOCK_HEADER_SIZE);
    }

    #[test]
    fn test_invalid_when_merkle_root_wrong() {
        let mut block = genesis();
        block.header.merkle_root = Hash256::zero();
        block.header.rehash();
        assert!(!block.is_valid());
    }

    #[test]
    fn test_header_hash_cache() {
        let mut header = genesis().header;
        let original = header.hash();
        header.nonce += 1;
        assert_eq!(header.hash(), original);
        assert_ne!(header.rehash(), original);
    }

    #[test]
    fn test_merkle_root_odd_count_duplicates_last() {
        let txs: Vec<Transaction> = (0..3)
            .map(|i| {
                Transaction::new(
                    1,
                    vec![TxIn::new(OutPoint::new(Hash256::zero(), i), Vec::new(), 0)],
                    vec![TxOut::new(1, Vec::new())],
                    0,
                )
            })
            .collect();
        let mut block = Block::new(BlockHeader::default(), txs);
        let hashes = block.tx_hashes();
        let expected = crate::crypto::hash_pair(
            &crate::crypto::hash_pair(&hashes[0], &hashes[1]),
            &crate::crypto::hash_pair(&hashes[2], &hashes[2]),
        );
        assert_eq!(block.calc_merkle_root(), expected);
    }

    #[test]
    fn test_locator_round_trip() {
        let locator = BlockLocator::new(70015, vec![Hash256::new([1; 32]), Hash256::new([2; 32])]);
        let encoded = locator.serialize();
        assert_eq!(encoded.len(), 4 + 1 + 64);
        assert_eq!(BlockLocator::deserialize(&encoded).unwrap(), locator);
    }

    #[test]
    fn test_block_summary() {
        let mut block = genesis();
        block.rehash();
        let value = serde_json::to_value(block.summary()).unwrap();
        assert_eq!(value["header"]["hash"], GENESIS_HASH);
        assert_eq!(value["header"]["nBits"], "1d00ffff");
        assert_eq!(value["header"]["version"], "00000001");
        assert_eq!(value["transactions"][0], block.header.merkle_root.to_hex());
    }
}
