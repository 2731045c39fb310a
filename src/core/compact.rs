//! Compact block relay objects: short ids, prefilled transactions and
//! block transaction requests

use super::block::{Block, BlockHeader};
use super::transaction::Transaction;
use crate::crypto::{sha256, siphash256};
use crate::wire::{
    read_array, read_compact_size, read_u64, read_vec, write_compact_size, write_vec, Decodable,
    DecodeError, Encodable, Hash256, MAX_PREALLOC,
};
use bytes::BufMut;
use std::io::Read;

/// Short ids keep the low 48 bits of the keyed hash
const SHORTID_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// Short transaction id for a block keyed by `(k0, k1)`
pub fn calculate_shortid(k0: u64, k1: u64, tx_hash: &Hash256) -> u64 {
    siphash256(k0, k1, tx_hash) & SHORTID_MASK
}

/// Turn absolute positions into gaps from the previous position.
/// Positions must be strictly increasing.
fn to_differential(absolute: &[u64]) -> Result<Vec<u64>, DecodeError> {
    let mut out = Vec::with_capacity(absolute.len());
    let mut next = 0u64;
    for index in absolute {
        let gap = index
            .checked_sub(next)
            .ok_or_else(|| DecodeError::InvalidValue(format!("index {} out of order", index)))?;
        out.push(gap);
        next = index
            .checked_add(1)
            .ok_or_else(|| DecodeError::InvalidValue("differential index overflow".into()))?;
    }
    Ok(out)
}

fn to_absolute(differential: &[u64]) -> Result<Vec<u64>, DecodeError> {
    let mut out = Vec::with_capacity(differential.len());
    let mut next = 0u64;
    for gap in differential {
        let index = next
            .checked_add(*gap)
            .ok_or_else(|| DecodeError::InvalidValue("differential index overflow".into()))?;
        out.push(index);
        next = index
            .checked_add(1)
            .ok_or_else(|| DecodeError::InvalidValue("differential index overflow".into()))?;
    }
    Ok(out)
}

// =============================================================================
// Prefilled Transaction
// =============================================================================

/// A transaction shipped in full inside a compact block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrefilledTransaction {
    /// Differential on the wire, absolute inside [`HeaderAndShortIds`]
    pub index: u64,
    pub tx: Transaction,
}

impl PrefilledTransaction {
    pub fn new(index: u64, tx: Transaction) -> Self {
        Self { index, tx }
    }
}

impl Encodable for PrefilledTransaction {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        write_compact_size(buf, self.index);
        self.tx.encode(buf);
    }
}

impl Decodable for PrefilledTransaction {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            index: read_compact_size(reader)?,
            tx: Transaction::decode(reader)?,
        })
    }
}

// =============================================================================
// Header And Short IDs
// =============================================================================

/// `cmpctblock` payload exactly as it travels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct P2PHeaderAndShortIds {
    pub header: BlockHeader,
    pub nonce: u64,
    /// 48-bit values, six bytes each on the wire
    pub shortids: Vec<u64>,
    pub prefilled_txn: Vec<PrefilledTransaction>,
}

impl Encodable for P2PHeaderAndShortIds {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.header.encode(buf);
        buf.put_u64_le(self.nonce);
        write_compact_size(buf, self.shortids.len() as u64);
        for id in &self.shortids {
            buf.put_slice(&id.to_le_bytes()[..6]);
        }
        write_vec(buf, &self.prefilled_txn);
    }
}

impl Decodable for P2PHeaderAndShortIds {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        let header = BlockHeader::decode(reader)?;
        let nonce = read_u64(reader)?;
        let count = read_compact_size(reader)?;
        let mut shortids = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
        for _ in 0..count {
            let raw = read_array::<6, _>(reader)?;
            let mut word = [0u8; 8];
            word[..6].copy_from_slice(&raw);
            shortids.push(u64::from_le_bytes(word));
        }
        Ok(Self {
            header,
            nonce,
            shortids,
            prefilled_txn: read_vec(reader)?,
        })
    }
}

/// Compact block with prefilled indices resolved to block positions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderAndShortIds {
    pub header: BlockHeader,
    pub nonce: u64,
    pub shortids: Vec<u64>,
    pub prefilled_txn: Vec<PrefilledTransaction>,
}

impl HeaderAndShortIds {
    pub fn from_p2p(p2p: P2PHeaderAndShortIds) -> Result<Self, DecodeError> {
        let gaps: Vec<u64> = p2p.prefilled_txn.iter().map(|p| p.index).collect();
        let absolute = to_absolute(&gaps)?;
        let prefilled_txn = p2p
            .prefilled_txn
            .into_iter()
            .zip(absolute)
            .map(|(p, index)| PrefilledTransaction::new(index, p.tx))
            .collect();
        Ok(Self {
            header: p2p.header,
            nonce: p2p.nonce,
            shortids: p2p.shortids,
            prefilled_txn,
        })
    }

    pub fn to_p2p(&self) -> Result<P2PHeaderAndShortIds, DecodeError> {
        let absolute: Vec<u64> = self.prefilled_txn.iter().map(|p| p.index).collect();
        let gaps = to_differential(&absolute)?;
        Ok(P2PHeaderAndShortIds {
            header: self.header.clone(),
            nonce: self.nonce,
            shortids: self.shortids.clone(),
            prefilled_txn: self
                .prefilled_txn
                .iter()
                .zip(gaps)
                .map(|(p, index)| PrefilledTransaction::new(index, p.tx.clone()))
                .collect(),
        })
    }

    /// SipHash keys: the first two little-endian words of
    /// `sha256(header || nonce)`
    pub fn siphash_keys(&self) -> (u64, u64) {
        let mut data = Encodable::serialize(&self.header);
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let digest = sha256(&data);
        let mut k0 = [0u8; 8];
        let mut k1 = [0u8; 8];
        k0.copy_from_slice(&digest[0..8]);
        k1.copy_from_slice(&digest[8..16]);
        (u64::from_le_bytes(k0), u64::from_le_bytes(k1))
    }

    /// Build from a full block, shipping the transactions at
    /// `prefill` in full and short ids for the rest.
    ///
    /// Prefill positions past the end of the block are ignored.
    pub fn from_block(block: &mut Block, nonce: u64, prefill: &[usize]) -> Self {
        let mut compact = Self {
            header: block.to_header(),
            nonce,
            shortids: Vec::new(),
            prefilled_txn: Vec::new(),
        };

        let mut positions: Vec<usize> = prefill
            .iter()
            .copied()
            .filter(|i| *i < block.txs.len())
            .collect();
        positions.sort_unstable();
        positions.dedup();

        let (k0, k1) = compact.siphash_keys();
        for (i, tx) in block.txs.iter_mut().enumerate() {
            if positions.binary_search(&i).is_ok() {
                compact
                    .prefilled_txn
                    .push(PrefilledTransaction::new(i as u64, tx.clone()));
            } else {
                compact.shortids.push(calculate_shortid(k0, k1, &tx.hash()));
            }
        }
        compact
    }
}

// =============================================================================
// Block Transactions
// =============================================================================

/// `getblocktxn` payload: differentially encoded positions in a block
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockTransactionsRequest {
    pub block_hash: Hash256,
    pub indexes: Vec<u64>,
}

impl BlockTransactionsRequest {
    pub fn new(block_hash: Hash256, indexes: Vec<u64>) -> Self {
        Self {
            block_hash,
            indexes,
        }
    }

    /// Request the given strictly increasing block positions
    pub fn from_absolute(block_hash: Hash256, absolute: &[u64]) -> Result<Self, DecodeError> {
        Ok(Self::new(block_hash, to_differential(absolute)?))
    }

    pub fn to_absolute(&self) -> Result<Vec<u64>, DecodeError> {
        to_absolute(&self.indexes)
    }
}

impl Encodable for BlockTransactionsRequest {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.block_hash.encode(buf);
        write_compact_size(buf, self.indexes.len() as u64);
        for index in &self.indexes {
            write_compact_size(buf, *index);
        }
    }
}

impl Decodable for BlockTransactionsRequest {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        let block_hash = Hash256::decode(reader)?;
        let count = read_compact_size(reader)?;
        let mut indexes = Vec::with_capacity((count as usize).min(MAX_PREALLOC));
        for _ in 0..count {
            indexes.push(read_compact_size(reader)?);
        }
        Ok(Self {
            block_hash,
            indexes,
        })
    }
}

/// `blocktxn` payload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockTransactions {
    pub block_hash: Hash256,
    pub transactions: Vec<Transaction>,
}

impl Encodable for BlockTransactions {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.block_hash.encode(buf);
        write_vec(buf, &self.transactions);
    }
}

impl Decodable for BlockTransactions {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            block_hash: Hash256::decode(reader)?,
            transactions: read_vec(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{OutPoint, TxIn, TxOut};

    fn tx(tag: u8) -> Transaction {
        Transaction::new(
            1,
            vec![TxIn::new(
                OutPoint::new(Hash256::new([tag; 32]), 0),
                vec![tag],
                0xFFFF_FFFF,
            )],
            vec![TxOut::new(50, vec![0x51])],
            0,
        )
    }

    fn block(n: u8) -> Block {
        let mut block = Block::new(BlockHeader::default(), (0..n).map(tx).collect());
        block.header.merkle_root = block.calc_merkle_root();
        block
    }

    #[test]
    fn test_differential_round_trip() {
        let p2p = P2PHeaderAndShortIds {
            prefilled_txn: vec![
                PrefilledTransaction::new(0, tx(0)),
                PrefilledTransaction::new(2, tx(3)),
                PrefilledTransaction::new(0, tx(4)),
            ],
            ..Default::default()
        };
        let compact = HeaderAndShortIds::from_p2p(p2p.clone()).unwrap();
        let positions: Vec<u64> = compact.prefilled_txn.iter().map(|p| p.index).collect();
        assert_eq!(positions, vec![0, 3, 4]);
        assert_eq!(compact.to_p2p().unwrap(), p2p);
    }

    #[test]
    fn test_out_of_order_prefill_rejected() {
        let compact = HeaderAndShortIds {
            prefilled_txn: vec![
                PrefilledTransaction::new(3, tx(3)),
                PrefilledTransaction::new(1, tx(1)),
            ],
            ..Default::default()
        };
        assert!(compact.to_p2p().is_err());
    }

    #[test]
    fn test_from_block_shortids() {
        let mut block = block(4);
        let compact = HeaderAndShortIds::from_block(&mut block, 42, &[0]);
        assert_eq!(compact.prefilled_txn.len(), 1);
        assert_eq!(compact.prefilled_txn[0].index, 0);
        assert_eq!(compact.shortids.len(), 3);

        let (k0, k1) = compact.siphash_keys();
        let mut header_nonce = Encodable::serialize(&block.header);
        header_nonce.extend_from_slice(&42u64.to_le_bytes());
        let digest = sha256(&header_nonce);
        assert_eq!(k0.to_le_bytes(), digest[0..8]);
        assert_eq!(k1.to_le_bytes(), digest[8..16]);

        let expected = calculate_shortid(k0, k1, &block.txs[1].hash());
        assert_eq!(compact.shortids[0], expected);
        assert!(compact.shortids.iter().all(|id| *id <= SHORTID_MASK));
    }

    #[test]
    fn test_cmpctblock_wire() {
        let mut block = block(3);
        let p2p = HeaderAndShortIds::from_block(&mut block, 7, &[0, 2])
            .to_p2p()
            .unwrap();
        let encoded = p2p.serialize();
        // header, nonce, one shortid of six bytes
        assert_eq!(encoded[88], 1);
        let decoded = P2PHeaderAndShortIds::deserialize(&encoded).unwrap();
        assert_eq!(decoded, p2p);
        assert_eq!(decoded.prefilled_txn[1].index, 1);
    }

    #[test]
    fn test_block_transactions_request_indexes() {
        let request = BlockTransactionsRequest::from_absolute(Hash256::zero(), &[1, 2, 5]).unwrap();
        assert_eq!(request.indexes, vec![1, 0, 2]);
        assert_eq!(request.to_absolute().unwrap(), vec![1, 2, 5]);

        let decoded = BlockTransactionsRequest::deserialize(&request.serialize()).unwrap();
        assert_eq!(decoded, request);
        assert!(BlockTransactionsRequest::from_absolute(Hash256::zero(), &[2, 2]).is_err());
    }

    #[test]
    fn test_index_at_numeric_edge() {
        assert!(matches!(
            BlockTransactionsRequest::from_absolute(Hash256::zero(), &[u64::MAX]),
            Err(DecodeError::InvalidValue(_))
        ));
        assert!(matches!(
            BlockTransactionsRequest::new(Hash256::zero(), vec![u64::MAX]).to_absolute(),
            Err(DecodeError::InvalidValue(_))
        ));

        let request =
            BlockTransactionsRequest::from_absolute(Hash256::zero(), &[0, u64::MAX - 1]).unwrap();
        assert_eq!(request.indexes, vec![0, u64::MAX - 2]);
        assert_eq!(request.to_absolute().unwrap(), vec![0, u64::MAX - 1]);
    }

    #[test]
    fn test_block_transactions() {
        let msg = BlockTransactions {
            block_hash: Hash256::new([9; 32]),
            transactions: vec![tx(1), tx(2)],
        };
        assert_eq!(BlockTransactions::deserialize(&msg.serialize()).unwrap(), msg);
    }
}
