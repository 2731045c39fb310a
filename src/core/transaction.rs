//! Transactions and their components
//!
//! Scripts are carried as opaque bytes; nothing here executes them.
//! The identity hash is cached on first use and is *not* refreshed when
//! fields change: callers that mutate a transaction must call
//! [`Transaction::rehash`] before relying on [`Transaction::hash`] again.

use super::consensus::MAX_MONEY;
use crate::crypto::double_sha256;
use crate::wire::{
    read_i32, read_i64, read_u32, read_var_bytes, read_vec, write_var_bytes, write_vec, Decodable,
    DecodeError, Encodable, Hash256,
};
use bytes::BufMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

// =============================================================================
// Outpoint
// =============================================================================

/// Reference to one output of an earlier transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash256,
    pub n: u32,
}

impl OutPoint {
    pub fn new(hash: Hash256, n: u32) -> Self {
        Self { hash, n }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.n)
    }
}

impl Encodable for OutPoint {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.hash.encode(buf);
        buf.put_u32_le(self.n);
    }
}

impl Decodable for OutPoint {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            hash: Hash256::decode(reader)?,
            n: read_u32(reader)?,
        })
    }
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxIn {
    pub prevout: OutPoint,
    /// Unlocking script
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Vec<u8>, sequence: u32) -> Self {
        Self {
            prevout,
            script_sig,
            sequence,
        }
    }
}

impl Encodable for TxIn {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.prevout.encode(buf);
        write_var_bytes(buf, &self.script_sig);
        buf.put_u32_le(self.sequence);
    }
}

impl Decodable for TxIn {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            prevout: OutPoint::decode(reader)?,
            script_sig: read_var_bytes(reader)?,
            sequence: read_u32(reader)?,
        })
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxOut {
    /// Amount in satoshis; signed on the wire
    pub value: i64,
    /// Locking script
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: i64, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    /// Value lies within `[0, MAX_MONEY]`
    pub fn is_valid(&self) -> bool {
        (0..=MAX_MONEY).contains(&self.value)
    }
}

impl Encodable for TxOut {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64_le(self.value);
        write_var_bytes(buf, &self.script_pubkey);
    }
}

impl Decodable for TxOut {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            value: read_i64(reader)?,
            script_pubkey: read_var_bytes(reader)?,
        })
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A transaction with a lazily cached identity hash
#[derive(Debug, Clone)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    hash: Option<Hash256>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new(1, Vec::new(), Vec::new(), 0)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.lock_time == other.lock_time
    }
}

impl Eq for Transaction {}

impl Transaction {
    pub fn new(version: i32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
            hash: None,
        }
    }

    /// Hash of the current serialization, ignoring any cached value
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

    /// The cached hash without computing; `None` until first hashed
    pub fn cached_hash(&self) -> Option<Hash256> {
        self.hash
    }

    /// Drop the cached hash and compute it again
    pub fn rehash(&mut self) -> Hash256 {
        self.hash = None;
        self.hash()
    }

    /// Every output value is within `[0, MAX_MONEY]`
    pub fn is_valid(&mut self) -> bool {
        self.hash();
        self.outputs.iter().all(TxOut::is_valid)
    }

    /// JSON-friendly view of the transaction
    pub fn summary(&self) -> TransactionSummary {
        TransactionSummary {
            hash: self.hash.unwrap_or_else(|| self.compute_hash()),
            version: self.version,
            vin: self
                .inputs
                .iter()
                .map(|input| InputSummary {
                    prevout: input.prevout,
                    script_sig: hex::encode(&input.script_sig),
                    sequence: format!("{:04x}", input.sequence),
                })
                .collect(),
            vout: self
                .outputs
                .iter()
                .map(|output| OutputSummary {
                    value: output.value,
                    script_pubkey: hex::encode(&output.script_pubkey),
                })
                .collect(),
            locktime: self.lock_time,
        }
    }
}

impl Encodable for Transaction {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(self.version);
        write_vec(buf, &self.inputs);
        write_vec(buf, &self.outputs);
        buf.put_u32_le(self.lock_time);
    }
}

impl Decodable for Transaction {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self::new(
            read_i32(reader)?,
            read_vec(reader)?,
            read_vec(reader)?,
            read_u32(reader)?,
        ))
    }
}

// =============================================================================
// Summaries
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSummary {
    pub prevout: OutPoint,
    #[serde(rename = "scriptSig")]
    pub script_sig: String,
    pub sequence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSummary {
    pub value: i64,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub hash: Hash256,
    pub version: i32,
    pub vin: Vec<InputSummary>,
    pub vout: Vec<OutputSummary>,
    pub locktime: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consensus::COIN;

    fn sample_tx() -> Transaction {
        Transaction::new(
            1,
            vec![TxIn::new(
                OutPoint::new(Hash256::new([0x11; 32]), 3),
                vec![0x51, 0x52],
                0xFFFF_FFFF,
            )],
            vec![
                TxOut::new(50 * COIN, vec![0x76, 0xA9]),
                TxOut::new(0, Vec::new()),
            ],
            0,
        )
    }

    #[test]
    fn test_tx_round_trip() {
        let tx = sample_tx();
        let encoded = tx.serialize();
        // version + 1 input (32+4+1+2+4) + 2 outputs (8+1+2, 8+1) + locktime
        assert_eq!(encoded.len(), 4 + 1 + 43 + 1 + 11 + 9 + 4);
        assert_eq!(Transaction::deserialize(&encoded).unwrap(), tx);
    }

    #[test]
    fn test_empty_tx_round_trip() {
        let tx = Transaction::default();
        let encoded = tx.serialize();
        assert_eq!(encoded, vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(Transaction::deserialize(&encoded).unwrap(), tx);
    }

    #[test]
    fn test_hash_is_cached_until_rehash() {
        let mut tx = sample_tx();
        assert!(tx.cached_hash().is_none());
        let first = tx.hash();
        assert_eq!(first, double_sha256(&tx.serialize()));

        tx.lock_time = 99;
        assert_eq!(tx.hash(), first);
        assert_ne!(tx.rehash(), first);
        assert_eq!(tx.hash(), tx.compute_hash());
    }

    #[test]
    fn test_output_value_range() {
        let mut tx = sample_tx();
        assert!(tx.is_valid());

        tx.outputs[0].value = MAX_MONEY;
        assert!(tx.is_valid());
        tx.outputs[0].value = MAX_MONEY + 1;
        assert!(!tx.is_valid());
        tx.outputs[0].value = -1;
        assert!(!tx.is_valid());
    }

    #[test]
    fn test_truncated_tx() {
        let encoded = sample_tx().serialize();
        let err = Transaction::deserialize(&encoded[..encoded.len() - 2]).unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn test_summary_fields() {
        let tx = sample_tx();
        let value = serde_json::to_value(tx.summary()).unwrap();
        assert_eq!(value["vin"][0]["scriptSig"], "5152");
        assert_eq!(value["vin"][0]["sequence"], "ffffffff");
        assert_eq!(value["vin"][0]["prevout"]["n"], 3);
        assert_eq!(value["vout"][0]["value"], 50 * COIN);
        assert_eq!(value["hash"], tx.compute_hash().to_hex());
    }
}
