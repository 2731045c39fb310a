//! Protocol constants shared by the object model and the connection layer

/// Protocol version announced in our `version` message
pub const MY_VERSION: i32 = 70015;

/// User agent announced in our `version` message
pub const MY_SUBVERSION: &str = "/Bitcoin SV:1.0.7/";

/// Relay flag appended to `version` from protocol 70001 on
pub const MY_RELAY: bool = true;

/// Peers at or below this version expect pings without a nonce
pub const BIP0031_VERSION: i32 = 60000;

/// Version every connection starts at before the handshake completes
pub const INITIAL_WIRE_VERSION: i32 = 209;

/// First version whose frames carry a checksum
pub const CHECKSUM_VERSION: i32 = 209;

/// First version whose `version` message carries sender address, nonce and user agent
pub const ADDR_FROM_VERSION: i32 = 106;

/// First version whose `version` message carries the relay flag
pub const RELAY_VERSION: i32 = 70001;

pub const MAX_INV_SZ: usize = 50_000;

/// Largest payload we advertise in `protoconf`
pub const MAX_PROTOCOL_RECV_PAYLOAD_LENGTH: u32 = 2 * 1024 * 1024;

/// Payload limit assumed for peers that have not sent `protoconf`
pub const LEGACY_MAX_PROTOCOL_PAYLOAD_LENGTH: u32 = 1024 * 1024;

/// Smallest serialized transaction
pub const MIN_TRANSACTION_SIZE: u32 = 60;

/// Most transactions a `merkleblock` may claim
pub const MAX_MERKLEBLOCK_TRANSACTIONS: u32 =
    MAX_PROTOCOL_RECV_PAYLOAD_LENGTH / MIN_TRANSACTION_SIZE;

/// Satoshis per coin
pub const COIN: i64 = 100_000_000;

/// Largest valid output value
pub const MAX_MONEY: i64 = 21_000_000 * COIN;

/// Bytes read from a socket at once
pub const READ_BUFFER_SIZE: usize = 8192;

/// Stream policies advertised in our `protoconf`
pub const STREAM_POLICIES: &str = "BlockPriority,Default";
