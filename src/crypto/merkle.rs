//! Merkle tree implementation for transaction inclusion proofs
//!
//! The tree is stored level by level with optional slots and walked
//! with a `(depth, index)` cursor. Root computation, branch extraction
//! and partial-tree population all move the same cursor, so a tree
//! built for `n` leaves has `ceil(log2(n)) + 1` levels and level `d`
//! holds `ceil(n / 2^(max_depth - d))` slots.

use super::hash::hash_pair;
use crate::wire::Hash256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Merkle proof errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Transaction not found among the block's leaves")]
    TxNotFound,
    #[error("Merkle tree has no leaves")]
    EmptyTree,
    #[error("Partial tree claims {0} transactions, more than allowed")]
    TooManyTransactions(u32),
    #[error("Partial tree carries {hashes} hashes for {total} transactions")]
    TooManyHashes { hashes: usize, total: u32 },
    #[error("Ran out of hashes while populating partial tree")]
    HashesExhausted,
    #[error("Ran out of flag bits while populating partial tree")]
    FlagsExhausted,
    #[error("{0} hashes left unconsumed")]
    UnconsumedHashes(usize),
    #[error("{0} flag bits left unconsumed")]
    UnconsumedFlags(usize),
    #[error("Invalid hash hex")]
    InvalidHex,
}

// =============================================================================
// Branches
// =============================================================================

/// Which side of the running hash a branch entry sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    L,
    R,
}

/// One step of an inclusion proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchEntry {
    pub hash: Hash256,
    pub pos: Side,
}

impl BranchEntry {
    pub fn new(hash: Hash256, pos: Side) -> Self {
        Self { hash, pos }
    }
}

// =============================================================================
// Tree
// =============================================================================

/// Level-ordered Merkle tree with a navigation cursor
#[derive(Debug, Clone)]
pub struct MerkleTree {
    total: usize,
    max_depth: usize,
    nodes: Vec<Vec<Option<Hash256>>>,
    depth: usize,
    index: usize,
}

impl MerkleTree {
    /// Create an empty tree sized for `total` leaves
    pub fn new(total: usize) -> Result<Self, ProofError> {
        if total == 0 {
            return Err(ProofError::EmptyTree);
        }
        let max_depth = (usize::BITS - (total - 1).leading_zeros()) as usize;
        let nodes = (0..=max_depth)
            .map(|depth| {
                let width = 1usize << (max_depth - depth);
                vec![None; total.div_ceil(width)]
            })
            .collect();

        Ok(Self {
            total,
            max_depth,
            nodes,
            depth: 0,
            index: 0,
        })
    }

    /// Build a tree over `leaves` and compute every node up to the root
    pub fn from_leaves(leaves: &[Hash256]) -> Result<Self, ProofError> {
        let mut tree = Self::new(leaves.len())?;
        tree.nodes[tree.max_depth] = leaves.iter().copied().map(Some).collect();
        tree.calc_root();
        Ok(tree)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn root(&self) -> Option<Hash256> {
        self.nodes[0][0]
    }

    /// Stored value at `(depth, index)`, if computed
    pub fn node(&self, depth: usize, index: usize) -> Option<Hash256> {
        self.nodes.get(depth)?.get(index).copied().flatten()
    }

    fn up(&mut self) {
        self.depth -= 1;
        self.index /= 2;
    }

    fn left(&mut self) {
        self.depth += 1;
        self.index *= 2;
    }

    fn right(&mut self) {
        self.depth += 1;
        self.index = self.index * 2 + 1;
    }

    fn set_current(&mut self, value: Hash256) {
        self.nodes[self.depth][self.index] = Some(value);
    }

    // Store the current node and step up, staying put at the root
    fn settle(&mut self, value: Hash256) {
        self.set_current(value);
        if !self.at_root() {
            self.up();
        }
    }

    fn left_node(&self) -> Option<Hash256> {
        self.nodes[self.depth + 1][self.index * 2]
    }

    fn right_node(&self) -> Option<Hash256> {
        self.nodes[self.depth + 1][self.index * 2 + 1]
    }

    fn is_leaf(&self) -> bool {
        self.depth == self.max_depth
    }

    fn at_root(&self) -> bool {
        self.depth == 0 && self.index == 0
    }

    fn right_exists(&self) -> bool {
        self.nodes[self.depth + 1].len() > self.index * 2 + 1
    }

    /// Fill every internal node; the leaf level must be populated.
    /// A node without a right sibling hashes its left child with itself.
    fn calc_root(&mut self) {
        self.depth = 0;
        self.index = 0;
        while self.root().is_none() {
            if self.is_leaf() {
                self.up();
                continue;
            }
            let Some(left) = self.left_node() else {
                self.left();
                continue;
            };
            if self.right_exists() {
                match self.right_node() {
                    None => self.right(),
                    Some(right) => self.settle(hash_pair(&left, &right)),
                }
            } else {
                self.settle(hash_pair(&left, &left));
            }
        }
    }

    /// Branch for the leaf at `pos`, closest sibling first.
    ///
    /// Where a level has no right sibling the node itself is emitted on
    /// the left so the verifier repeats the duplicate-hash step.
    pub fn branch(&mut self, pos: usize) -> Result<Vec<BranchEntry>, ProofError> {
        if pos >= self.total {
            return Err(ProofError::TxNotFound);
        }
        let mut branches = Vec::with_capacity(self.max_depth);
        self.depth = self.max_depth;
        self.index = pos;

        while !self.at_root() {
            let from_left = self.index % 2 == 0;
            self.up();
            let left = self.left_node().ok_or(ProofError::EmptyTree)?;
            let entry = if !self.right_exists() {
                BranchEntry::new(left, Side::L)
            } else if from_left {
                let right = self.right_node().ok_or(ProofError::EmptyTree)?;
                BranchEntry::new(right, Side::R)
            } else {
                BranchEntry::new(left, Side::L)
            };
            branches.push(entry);
        }
        Ok(branches)
    }

    /// Populate an empty tree from depth-first flag bits and hashes.
    ///
    /// Returns the number of flag bits consumed; every hash must be used.
    fn populate_from(
        &mut self,
        flags: &[bool],
        hashes: &[Hash256],
        matched: &mut Vec<(usize, Hash256)>,
    ) -> Result<usize, ProofError> {
        let mut flag_cursor = flags.iter().copied();
        let mut hash_cursor = hashes.iter().copied();
        let mut flags_used = 0usize;
        let mut next_flag = || {
            flags_used += 1;
            flag_cursor.next().ok_or(ProofError::FlagsExhausted)
        };

        self.depth = 0;
        self.index = 0;
        while self.root().is_none() {
            if self.is_leaf() {
                let flag = next_flag()?;
                let hash = hash_cursor.next().ok_or(ProofError::HashesExhausted)?;
                if flag {
                    matched.push((self.index, hash));
                }
                self.settle(hash);
                continue;
            }

            match self.left_node() {
                None => {
                    if next_flag()? {
                        self.left();
                    } else {
                        let hash = hash_cursor.next().ok_or(ProofError::HashesExhausted)?;
                        self.settle(hash);
                    }
                }
                Some(left) if self.right_exists() => match self.right_node() {
                    None => self.right(),
                    Some(right) => self.settle(hash_pair(&left, &right)),
                },
                Some(left) => self.settle(hash_pair(&left, &left)),
            }
        }

        let leftover = hash_cursor.count();
        if leftover != 0 {
            return Err(ProofError::UnconsumedHashes(leftover));
        }
        Ok(flags_used)
    }

    /// Populate from exact flag bits; any leftover bit or hash is an error
    pub fn populate(
        &mut self,
        flags: &[bool],
        hashes: &[Hash256],
    ) -> Result<PartialTreeMatch, ProofError> {
        let mut matched = Vec::new();
        let used = self.populate_from(flags, hashes, &mut matched)?;
        if used != flags.len() {
            return Err(ProofError::UnconsumedFlags(flags.len() - used));
        }
        self.finish_match(matched)
    }

    /// Populate from flag bytes as carried in a `merkleblock`.
    ///
    /// The trailing bits of the last byte are padding: fewer than eight
    /// zero bits may remain, anything else is an error.
    pub fn populate_from_bytes(
        &mut self,
        flag_bytes: &[u8],
        hashes: &[Hash256],
    ) -> Result<PartialTreeMatch, ProofError> {
        let flags = bytes_to_bit_field(flag_bytes);
        let mut matched = Vec::new();
        let used = self.populate_from(&flags, hashes, &mut matched)?;
        let rest = &flags[used.min(flags.len())..];
        if rest.len() >= 8 || rest.iter().any(|bit| *bit) {
            return Err(ProofError::UnconsumedFlags(rest.len()));
        }
        self.finish_match(matched)
    }

    fn finish_match(&self, matched: Vec<(usize, Hash256)>) -> Result<PartialTreeMatch, ProofError> {
        let root = self.root().ok_or(ProofError::EmptyTree)?;
        Ok(PartialTreeMatch { root, matched })
    }

    /// Depth-first flags and hashes proving the leaves marked in `matches`
    pub fn build_partial(&self, matches: &[bool]) -> (Vec<bool>, Vec<Hash256>) {
        let mut flags = Vec::new();
        let mut hashes = Vec::new();
        self.traverse_and_build(0, 0, matches, &mut flags, &mut hashes);
        (flags, hashes)
    }

    fn traverse_and_build(
        &self,
        depth: usize,
        index: usize,
        matches: &[bool],
        flags: &mut Vec<bool>,
        hashes: &mut Vec<Hash256>,
    ) {
        let span = self.max_depth - depth;
        let first = index << span;
        let last = ((index + 1) << span).min(self.total);
        let parent_of_match = (first..last).any(|i| matches.get(i).copied().unwrap_or(false));
        flags.push(parent_of_match);

        if depth == self.max_depth || !parent_of_match {
            if let Some(hash) = self.node(depth, index) {
                hashes.push(hash);
            }
            return;
        }

        self.traverse_and_build(depth + 1, index * 2, matches, flags, hashes);
        if self.nodes[depth + 1].len() > index * 2 + 1 {
            self.traverse_and_build(depth + 1, index * 2 + 1, matches, flags, hashes);
        }
    }
}

/// Root and matched leaves recovered from a partial tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTreeMatch {
    pub root: Hash256,
    /// `(leaf index, hash)` for every leaf flagged as matched
    pub matched: Vec<(usize, Hash256)>,
}

// =============================================================================
// Free functions
// =============================================================================

/// Merkle root of `leaves`, zero for an empty list
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    match MerkleTree::from_leaves(leaves) {
        Ok(tree) => tree.root().unwrap_or_default(),
        Err(_) => Hash256::zero(),
    }
}

/// Branch proving `tx` is among `txs`; a single-leaf tree needs no branch
pub fn create_merkle_branch(tx: &Hash256, txs: &[Hash256]) -> Result<Vec<BranchEntry>, ProofError> {
    let pos = txs
        .iter()
        .position(|h| h == tx)
        .ok_or(ProofError::TxNotFound)?;
    if txs.len() == 1 {
        return Ok(Vec::new());
    }
    let mut tree = MerkleTree::from_leaves(txs)?;
    tree.branch(pos)
}

/// Fold `tx` through `branches` to the root it implies
pub fn branch_root(tx: &Hash256, branches: &[BranchEntry]) -> Hash256 {
    branches.iter().fold(*tx, |running, entry| match entry.pos {
        Side::R => hash_pair(&running, &entry.hash),
        Side::L => hash_pair(&entry.hash, &running),
    })
}

/// Verify that `branches` lead from `tx` to `root`
pub fn verify_merkle_branch(tx: &Hash256, branches: &[BranchEntry], root: &Hash256) -> bool {
    branch_root(tx, branches) == *root
}

/// Expand flag bytes to bits, least significant bit of each byte first
pub fn bytes_to_bit_field(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|b| (0..8).map(move |i| b >> i & 1 == 1))
        .collect()
}

/// Pack bits into bytes, least significant bit first, zero padded
pub fn bit_field_to_bytes(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}

/// Merkle-proof query result handed to the API layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProofResult {
    pub block_hash: Hash256,
    pub merkle_root: Hash256,
    pub tx_hash: Hash256,
    pub branches: Vec<BranchEntry>,
}

impl MerkleProofResult {
    /// Build the proof for `tx_hash` within a block's ordered transaction hashes
    pub fn build(block_hash: Hash256, tx_hash: Hash256, txs: &[Hash256]) -> Result<Self, ProofError> {
        let branches = create_merkle_branch(&tx_hash, txs)?;
        Ok(Self {
            block_hash,
            merkle_root: merkle_root(txs),
            tx_hash,
            branches,
        })
    }

    pub fn verify(&self) -> bool {
        verify_merkle_branch(&self.tx_hash, &self.branches, &self.merkle_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> Hash256 {
        Hash256::from_hex(s).unwrap()
    }

    fn e(s: &str, pos: Side) -> BranchEntry {
        BranchEntry::new(h(s), pos)
    }

    fn leaves(n: usize) -> Vec<Hash256> {
        (0..n)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[..8].copy_from_slice(&(i as u64 + 1).to_le_bytes());
                crate::crypto::double_sha256(&bytes)
            })
            .collect()
    }

    const TWO: [&str; 2] = [
        "931475bee79c76509ccb01916998009c93afd54f4bcce431299848b473d53aef",
        "d3dc8224dc896986cebb8bf78cb658c8ca7b85c1b99077d835dee5f81424e7b9",
    ];

    const THREE: [&str; 3] = [
        "779d313658cd99d9adb8446521552301e5bb29eb74eff84d562c9954885d6747",
        "791161487f7411a3a937f287cab52b22ff4ca223c2409af4b99587c8b694560d",
        "f3ff50949f82b6eaa0fc8dc0d4764687117128c3cee73025b13ed1bd88f4e1d7",
    ];

    const FIVE: [&str; 5] = [
        "eafcf1a1e2c8694433fdec50fdb0020c89decd2049d5bfad2cb0d5f61f00a049",
        "48a1542f7f2b8385a049a28635ab4276ebcaf424dd4b37506e9af816de20f234",
        "507a38f1f380107f4e5039f0204b49cf23f676f80ef9a97cf5fdaa275099db45",
        "bead66e14d905be19b64c4b26dd19d5db6127ffb7a5f019ce1856f97278e8eae",
        "c16407dc758f6d35d1502cecf0546d17e17679c12e9500217986e5c32f56e694",
    ];

    fn hashes(list: &[&str]) -> Vec<Hash256> {
        list.iter().map(|s| h(s)).collect()
    }

    #[test]
    fn test_two_leaves() {
        let txs = hashes(&TWO);
        assert_eq!(
            create_merkle_branch(&txs[0], &txs).unwrap(),
            vec![e(TWO[1], Side::R)]
        );
        assert_eq!(
            create_merkle_branch(&txs[1], &txs).unwrap(),
            vec![e(TWO[0], Side::L)]
        );
        assert_eq!(merkle_root(&txs), hash_pair(&txs[0], &txs[1]));
    }

    #[test]
    fn test_three_leaves() {
        let txs = hashes(&THREE);
        let cc = "553e149e13bf81daa893e2517d5f438f1ccb166c405e214ca7a1d2fc31c284dd";
        let ab = "7109e178183e6198b293ed261e370ba3f353038e557baac317f017b5420ff2c5";

        assert_eq!(
            create_merkle_branch(&txs[0], &txs).unwrap(),
            vec![e(THREE[1], Side::R), e(cc, Side::R)]
        );
        assert_eq!(
            create_merkle_branch(&txs[1], &txs).unwrap(),
            vec![e(THREE[0], Side::L), e(cc, Side::R)]
        );
        assert_eq!(
            create_merkle_branch(&txs[2], &txs).unwrap(),
            vec![e(THREE[2], Side::L), e(ab, Side::L)]
        );

        assert_eq!(hash_pair(&txs[0], &txs[1]), h(ab));
        assert_eq!(hash_pair(&txs[2], &txs[2]), h(cc));
        let expected = hash_pair(
            &hash_pair(&txs[0], &txs[1]),
            &hash_pair(&txs[2], &txs[2]),
        );
        assert_eq!(merkle_root(&txs), expected);
    }

    #[test]
    fn test_five_leaves() {
        let txs = hashes(&FIVE);
        assert_eq!(
            create_merkle_branch(&txs[0], &txs).unwrap(),
            vec![
                e(FIVE[1], Side::R),
                e("4fe7355a0a96b6f1a415bc8d91f5f6a586701692f4e4e8c96f712d70324aa275", Side::R),
                e("074e67ffa1feb37c979aac90f43174a7bac0399c833da0d9bf257072b9186bc0", Side::R),
            ]
        );
        assert_eq!(
            create_merkle_branch(&txs[4], &txs).unwrap(),
            vec![
                e(FIVE[4], Side::L),
                e("76bcb15456f4efbcae13a5c3e0205358d92f50d4c98f4a7c574bcb11bbcd24b1", Side::L),
                e("40a129b27ab77c3dff72dc3e459c3f30293dafd54b5a0ae93779433265368422", Side::L),
            ]
        );
    }

    #[test]
    fn test_single_leaf_has_empty_branch() {
        let txs = leaves(1);
        let branch = create_merkle_branch(&txs[0], &txs).unwrap();
        assert!(branch.is_empty());
        assert_eq!(merkle_root(&txs), txs[0]);
        assert!(verify_merkle_branch(&txs[0], &branch, &txs[0]));
    }

    #[test]
    fn test_every_leaf_verifies() {
        for n in [1usize, 2, 3, 5, 70] {
            let txs = leaves(n);
            let root = merkle_root(&txs);
            for tx in &txs {
                let branch = create_merkle_branch(tx, &txs).unwrap();
                assert!(verify_merkle_branch(tx, &branch, &root), "n={} tx={}", n, tx);
            }
        }
    }

    #[test]
    fn test_missing_tx() {
        let txs = leaves(4);
        let other = Hash256::new([9u8; 32]);
        assert_eq!(
            create_merkle_branch(&other, &txs),
            Err(ProofError::TxNotFound)
        );
        assert_eq!(MerkleTree::new(0).unwrap_err(), ProofError::EmptyTree);
    }

    #[test]
    fn test_real_block_proof() {
        let json = r#"{
            "block_hash": "00000000000004e157046be273f3e0d05ce257ca059e97245c2bc07c24c1bf4f",
            "merkle_root": "847e947a615689a7b4c0bf09ad85c20c6206d1eab25d11d78cde0a298525674f",
            "tx_hash": "ff4d80f428d244bbd313d14f6b3502e740f3e1dc4768b3115b8cf3734e586856",
            "branches": [
                {"hash": "0bd3573b03203754d77f7d6c47a35e81d53bf149f015ad43ceae1e7a14b2a1d2", "pos": "L"},
                {"hash": "e32b529f9573bd30443ee499c96756fa605a3041845e4628e0aab49833598e9e", "pos": "L"},
                {"hash": "1efc9dc86232dc76ab61cd6bda4e9507db5da9ef1aaba760e15b108b66a0f093", "pos": "R"},
                {"hash": "a9ed5525642b47cbe3abe4242da3f0fdbc60b86e2ead1be4b22002f4207f9a62", "pos": "R"},
                {"hash": "487859b95cccaddc17172c0c02ebdb234ff25e9e3c6ba2f7dd8036d0eb9dcdad", "pos": "R"},
                {"hash": "c86e37aaa832608ec063e740edea0c6d9507057d00ec904be4a34c2f1fe932dc", "pos": "R"},
                {"hash": "3d40e87a98db919283965773b132105cc33ca3123ed2cc562c2de98c6f3385a7", "pos": "R"},
                {"hash": "c0d43f577fde226685f3a208889e7039d1cf786320218f3d565cb468ccdde511", "pos": "R"}
            ]
        }"#;
        let proof: MerkleProofResult = serde_json::from_str(json).unwrap();
        assert_eq!(proof.branches.len(), 8);
        assert!(proof.verify());

        let mut tampered = proof.clone();
        tampered.branches[3].pos = Side::L;
        assert!(!tampered.verify());
    }

    #[test]
    fn test_proof_result_json_shape() {
        let txs = hashes(&TWO);
        let proof = MerkleProofResult::build(Hash256::zero(), txs[0], &txs).unwrap();
        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value["branches"][0]["pos"], "R");
        assert_eq!(value["branches"][0]["hash"], TWO[1]);
        assert_eq!(value["tx_hash"], TWO[0]);
    }

    #[test]
    fn test_partial_tree_round_trip() {
        let txs = leaves(7);
        let root = merkle_root(&txs);
        let tree = MerkleTree::from_leaves(&txs).unwrap();
        let mut matches = vec![false; 7];
        matches[2] = true;
        matches[6] = true;

        let (flags, proof_hashes) = tree.build_partial(&matches);
        let mut partial = MerkleTree::new(7).unwrap();
        let result = partial.populate(&flags, &proof_hashes).unwrap();
        assert_eq!(result.root, root);
        assert_eq!(result.matched, vec![(2, txs[2]), (6, txs[6])]);

        let bytes = bit_field_to_bytes(&flags);
        let mut partial = MerkleTree::new(7).unwrap();
        let result = partial.populate_from_bytes(&bytes, &proof_hashes).unwrap();
        assert_eq!(result.root, root);
    }

    #[test]
    fn test_partial_tree_no_match_is_root_only() {
        let txs = leaves(5);
        let tree = MerkleTree::from_leaves(&txs).unwrap();
        let (flags, proof_hashes) = tree.build_partial(&[false; 5]);
        assert_eq!(flags, vec![false]);
        assert_eq!(proof_hashes, vec![merkle_root(&txs)]);
    }

    #[test]
    fn test_partial_tree_leftover_hash() {
        let txs = leaves(4);
        let tree = MerkleTree::from_leaves(&txs).unwrap();
        let (flags, mut proof_hashes) = tree.build_partial(&[true, false, false, false]);
        proof_hashes.push(Hash256::new([1u8; 32]));

        let mut partial = MerkleTree::new(4).unwrap();
        assert_eq!(
            partial.populate(&flags, &proof_hashes),
            Err(ProofError::UnconsumedHashes(1))
        );
    }

    #[test]
    fn test_partial_tree_leftover_flags() {
        let txs = leaves(4);
        let tree = MerkleTree::from_leaves(&txs).unwrap();
        let (mut flags, proof_hashes) = tree.build_partial(&[false, true, false, false]);
        flags.push(false);

        let mut partial = MerkleTree::new(4).unwrap();
        assert_eq!(
            partial.populate(&flags, &proof_hashes),
            Err(ProofError::UnconsumedFlags(1))
        );

        flags.pop();
        flags.extend([false; 8]);
        let mut partial = MerkleTree::new(4).unwrap();
        assert!(matches!(
            partial.populate_from_bytes(&bit_field_to_bytes(&flags), &proof_hashes),
            Err(ProofError::UnconsumedFlags(_))
        ));
    }

    #[test]
    fn test_partial_tree_exhausted_inputs() {
        let txs = leaves(4);
        let tree = MerkleTree::from_leaves(&txs).unwrap();
        let (flags, proof_hashes) = tree.build_partial(&[true, false, false, false]);

        let mut partial = MerkleTree::new(4).unwrap();
        assert_eq!(
            partial.populate(&flags, &proof_hashes[..1]),
            Err(ProofError::HashesExhausted)
        );
        let mut partial = MerkleTree::new(4).unwrap();
        assert_eq!(
            partial.populate(&flags[..2], &proof_hashes),
            Err(ProofError::FlagsExhausted)
        );
    }

    #[test]
    fn test_bit_field_lsb_first() {
        assert_eq!(
            bytes_to_bit_field(&[0x35]),
            vec![true, false, true, false, true, true, false, false]
        );
        let bits = [true, true, false, true];
        assert_eq!(bit_field_to_bytes(&bits), vec![0x0B]);
    }
}
