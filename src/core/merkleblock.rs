//! Filtered blocks: a header plus a partial Merkle tree proving a subset
//! of its transactions

use super::block::{Block, BlockHeader};
use super::consensus::MAX_MERKLEBLOCK_TRANSACTIONS;
use crate::crypto::{bit_field_to_bytes, MerkleTree, PartialTreeMatch, ProofError};
use crate::wire::{
    read_u32, read_var_bytes, read_vec, write_var_bytes, write_vec, Decodable, DecodeError,
    Encodable, Hash256,
};
use bytes::BufMut;
use std::io::Read;

/// `merkleblock` payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MerkleBlock {
    pub header: BlockHeader,
    pub total_transactions: u32,
    /// Depth-first hashes of the partial tree
    pub hashes: Vec<Hash256>,
    /// Depth-first flag bits, least significant bit first
    pub flags: Vec<u8>,
}

impl MerkleBlock {
    /// Prove the transactions of `block` whose hashes are in `matches`
    pub fn from_block(block: &mut Block, matches: &[Hash256]) -> Result<Self, ProofError> {
        let leaves = block.tx_hashes();
        let tree = MerkleTree::from_leaves(&leaves)?;
        let flagged: Vec<bool> = leaves.iter().map(|h| matches.contains(h)).collect();
        let (bits, hashes) = tree.build_partial(&flagged);
        Ok(Self {
            header: block.to_header(),
            total_transactions: leaves.len() as u32,
            hashes,
            flags: bit_field_to_bytes(&bits),
        })
    }

    /// Reject counts that cannot describe a partial tree
    fn check_bounds(&self) -> Result<(), ProofError> {
        let total = self.total_transactions;
        if total == 0 {
            return Err(ProofError::EmptyTree);
        }
        if total > MAX_MERKLEBLOCK_TRANSACTIONS {
            return Err(ProofError::TooManyTransactions(total));
        }
        if self.hashes.len() > total as usize {
            return Err(ProofError::TooManyHashes {
                hashes: self.hashes.len(),
                total,
            });
        }
        // One flag bit per hash at least
        if self.flags.len() * 8 < self.hashes.len() {
            return Err(ProofError::FlagsExhausted);
        }
        Ok(())
    }

    /// Rebuild the partial tree, returning its root and the matched leaves.
    /// Counts are checked before the tree is allocated.
    pub fn extract_matches(&self) -> Result<PartialTreeMatch, ProofError> {
        self.check_bounds()?;
        let mut tree = MerkleTree::new(self.total_transactions as usize)?;
        tree.populate_from_bytes(&self.flags, &self.hashes)
    }

    /// True when the partial tree rebuilds to the header's Merkle root
    pub fn verify(&self) -> bool {
        matches!(self.extract_matches(), Ok(m) if m.root == self.header.merkle_root)
    }
}

impl Encodable for MerkleBlock {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.header.encode(buf);
        buf.put_u32_le(self.total_transactions);
        write_vec(buf, &self.hashes);
        write_var_bytes(buf, &self.flags);
    }
}

impl Decodable for MerkleBlock {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            header: BlockHeader::decode(reader)?,
            total_transactions: read_u32(reader)?,
            hashes: read_vec(reader)?,
            flags: read_var_bytes(reader)?,
        })
    }
}
