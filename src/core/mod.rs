//! Core protocol objects
//!
//! Transactions, blocks and every structure carried inside a P2P
//! message. Each type has a byte-exact [`Encodable`](crate::wire::Encodable)
//! and [`Decodable`](crate::wire::Decodable) implementation.

pub mod address;
pub mod block;
pub mod compact;
pub mod consensus;
pub mod inventory;
pub mod merkleblock;
pub mod protocol;
pub mod transaction;

pub use address::{Address, AssociationId, ServiceFlags, StreamType, VersionAddress};
pub use block::{Block, BlockHeader, BlockLocator, BlockSummary, HeaderSummary, BLOCK_HEADER_SIZE};
pub use compact::{
    calculate_shortid, BlockTransactions, BlockTransactionsRequest, HeaderAndShortIds,
    P2PHeaderAndShortIds, PrefilledTransaction,
};
pub use inventory::{InvType, Inventory};
pub use merkleblock::MerkleBlock;
pub use protocol::{Alert, CallbackMessage, Protoconf, UnsignedAlert};
pub use transaction::{OutPoint, Transaction, TransactionSummary, TxIn, TxOut};
