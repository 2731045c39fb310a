//! P2P message catalog
//!
//! Every message this node speaks is one variant of [`Message`]. The
//! wire command name of each variant and the decoder chosen for each
//! command are both fixed here, in [`Message::command`] and
//! [`Message::decode_payload`].

use crate::core::consensus::{
    ADDR_FROM_VERSION, INITIAL_WIRE_VERSION, MY_RELAY, MY_SUBVERSION, MY_VERSION, RELAY_VERSION,
};
use crate::core::{
    Address, Alert, AssociationId, Block, BlockHeader, BlockLocator, BlockTransactions,
    BlockTransactionsRequest, Inventory, MerkleBlock, P2PHeaderAndShortIds, Protoconf,
    ServiceFlags, StreamType, Transaction, VersionAddress,
};
use crate::wire::{
    read_bool, read_i32, read_i64, read_u64, read_u8, read_var_bytes, read_var_string,
    read_vec, write_compact_size, write_var_bytes, write_vec, Decodable, DecodeError,
    Encodable, Hash256,
};
use bytes::BufMut;
use rand::Rng;
use std::fmt;
use std::io::Read;

/// Some old nodes announce 300 as 10300
const MISENCODED_VERSION_300: i32 = 10300;

// =============================================================================
// Version
// =============================================================================

/// Handshake announcement.
///
/// Which fields travel depends on `version` itself: sender address,
/// nonce and user agent from 106, start height from 209, relay flag and
/// association id from 70001. The last two are optional on the wire
/// even then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: ServiceFlags,
    /// Unix seconds
    pub time: i64,
    pub addr_to: VersionAddress,
    pub addr_from: Option<VersionAddress>,
    pub nonce: Option<u64>,
    pub user_agent: Option<String>,
    pub start_height: Option<i32>,
    pub relay: bool,
    pub association_id: Option<AssociationId>,
}

impl VersionMessage {
    /// Our own announcement, stamped with the current time and a fresh
    /// nonce and association id
    pub fn new(addr_to: VersionAddress) -> Self {
        Self {
            version: MY_VERSION,
            services: ServiceFlags::NETWORK,
            time: chrono::Utc::now().timestamp(),
            addr_to,
            addr_from: Some(VersionAddress::default()),
            nonce: Some(rand::thread_rng().gen()),
            user_agent: Some(MY_SUBVERSION.to_string()),
            start_height: Some(-1),
            relay: MY_RELAY,
            association_id: Some(AssociationId::random()),
        }
    }
}

impl Encodable for VersionMessage {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_le(self.version);
        buf.put_u64_le(self.services.bits());
        buf.put_i64_le(self.time);
        self.addr_to.encode(buf);

        if self.version >= ADDR_FROM_VERSION {
            self.addr_from.unwrap_or_default().encode(buf);
            buf.put_u64_le(self.nonce.unwrap_or(0));
            write_var_bytes(buf, self.user_agent.as_deref().unwrap_or("").as_bytes());
        }
        if self.version >= INITIAL_WIRE_VERSION {
            buf.put_i32_le(self.start_height.unwrap_or(-1));
        }
        if self.version >= RELAY_VERSION {
            buf.put_i8(self.relay as i8);
            AssociationId::encode_optional(&self.association_id, buf);
        }
    }
}

impl Decodable for VersionMessage {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut version = read_i32(reader)?;
        if version == MISENCODED_VERSION_300 {
            version = 300;
        }
        let services = ServiceFlags::from_bits_retain(read_u64(reader)?);
        let time = read_i64(reader)?;
        let addr_to = VersionAddress::decode(reader)?;

        let mut msg = Self {
            version,
            services,
            time,
            addr_to,
            addr_from: None,
            nonce: None,
            user_agent: None,
            start_height: None,
            relay: false,
            association_id: None,
        };

        if version >= ADDR_FROM_VERSION {
            msg.addr_from = Some(VersionAddress::decode(reader)?);
            msg.nonce = Some(read_u64(reader)?);
            msg.user_agent = Some(read_var_string(reader)?);
        }
        if version >= INITIAL_WIRE_VERSION {
            msg.start_height = Some(read_i32(reader)?);
        }
        if version >= RELAY_VERSION {
            // Both trailing fields are optional
            if let Ok(relay) = read_u8(reader) {
                msg.relay = relay != 0;
                msg.association_id = AssociationId::decode_blob(reader).ok().flatten();
            }
        }
        Ok(msg)
    }
}

// =============================================================================
// Message payloads
// =============================================================================

/// `createstrm`: open another stream inside an association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStream {
    pub association_id: Option<AssociationId>,
    pub stream_type: u8,
    pub stream_policy: Vec<u8>,
}

impl CreateStream {
    pub fn new(association_id: AssociationId, stream_type: StreamType, policy: &[u8]) -> Self {
        Self {
            association_id: Some(association_id),
            stream_type: stream_type as u8,
            stream_policy: policy.to_vec(),
        }
    }
}

impl Encodable for CreateStream {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        AssociationId::encode_optional(&self.association_id, buf);
        buf.put_u8(self.stream_type);
        write_var_bytes(buf, &self.stream_policy);
    }
}

impl Decodable for CreateStream {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            association_id: AssociationId::decode_blob(reader)?,
            stream_type: read_u8(reader)?,
            stream_policy: read_var_bytes(reader)?,
        })
    }
}

/// `streamack`: confirms a `createstrm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAck {
    pub association_id: Option<AssociationId>,
    pub stream_type: u8,
}

impl Encodable for StreamAck {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        AssociationId::encode_optional(&self.association_id, buf);
        buf.put_u8(self.stream_type);
    }
}

impl Decodable for StreamAck {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            association_id: AssociationId::decode_blob(reader)?,
            stream_type: read_u8(reader)?,
        })
    }
}

/// `getblocks` and `getheaders`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocatorRequest {
    pub locator: BlockLocator,
    /// Zero requests as many as the peer will send
    pub hash_stop: Hash256,
}

impl Encodable for LocatorRequest {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        self.locator.encode(buf);
        self.hash_stop.encode(buf);
    }
}

impl Decodable for LocatorRequest {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            locator: BlockLocator::decode(reader)?,
            hash_stop: Hash256::decode(reader)?,
        })
    }
}

/// `reject`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reject {
    /// Command of the rejected message
    pub message: String,
    pub code: u8,
    pub reason: String,
    /// Hash of the rejected object; only on the wire for blocks and
    /// transactions that were not malformed
    pub data: Hash256,
}

impl Reject {
    pub const REJECT_MALFORMED: u8 = 1;

    fn carries_hash(&self) -> bool {
        self.code != Self::REJECT_MALFORMED && (self.message == "block" || self.message == "tx")
    }
}

impl Encodable for Reject {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        write_var_bytes(buf, self.message.as_bytes());
        buf.put_u8(self.code);
        write_var_bytes(buf, self.reason.as_bytes());
        if self.carries_hash() {
            self.data.encode(buf);
        }
    }
}

impl Decodable for Reject {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut reject = Self {
            message: read_var_string(reader)?,
            code: read_u8(reader)?,
            reason: read_var_string(reader)?,
            data: Hash256::zero(),
        };
        if reject.carries_hash() {
            reject.data = Hash256::decode(reader)?;
        }
        Ok(reject)
    }
}

// =============================================================================
// Message
// =============================================================================

/// One P2P message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Version(VersionMessage),
    Verack,
    Protoconf(Protoconf),
    CreateStream(CreateStream),
    StreamAck(StreamAck),
    Addr(Vec<Address>),
    Alert(Alert),
    Inv(Vec<Inventory>),
    GetData(Vec<Inventory>),
    NotFound(Vec<Inventory>),
    GetBlocks(LocatorRequest),
    GetHeaders(LocatorRequest),
    Tx(Transaction),
    Block(Block),
    Headers(Vec<BlockHeader>),
    GetAddr,
    Mempool,
    /// `None` for peers that predate ping nonces
    Ping(Option<u64>),
    Pong(u64),
    Reject(Reject),
    FeeFilter(u64),
    SendHeaders,
    SendCmpct { announce: bool, version: u64 },
    CmpctBlock(P2PHeaderAndShortIds),
    GetBlockTxn(BlockTransactionsRequest),
    BlockTxn(BlockTransactions),
    MerkleBlock(MerkleBlock),
}

impl Message {
    /// Every command name this node decodes
    pub const COMMANDS: [&'static str; 27] = [
        "version",
        "verack",
        "protoconf",
        "createstrm",
        "streamack",
        "addr",
        "alert",
        "inv",
        "getdata",
        "notfound",
        "getblocks",
        "getheaders",
        "tx",
        "block",
        "headers",
        "getaddr",
        "mempool",
        "ping",
        "pong",
        "reject",
        "feefilter",
        "sendheaders",
        "sendcmpct",
        "cmpctblock",
        "getblocktxn",
        "blocktxn",
        "merkleblock",
    ];

    /// Wire command name
    pub fn command(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::Verack => "verack",
            Message::Protoconf(_) => "protoconf",
            Message::CreateStream(_) => "createstrm",
            Message::StreamAck(_) => "streamack",
            Message::Addr(_) => "addr",
            Message::Alert(_) => "alert",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::NotFound(_) => "notfound",
            Message::GetBlocks(_) => "getblocks",
            Message::GetHeaders(_) => "getheaders",
            Message::Tx(_) => "tx",
            Message::Block(_) => "block",
            Message::Headers(_) => "headers",
            Message::GetAddr => "getaddr",
            Message::Mempool => "mempool",
            Message::Ping(_) => "ping",
            Message::Pong(_) => "pong",
            Message::Reject(_) => "reject",
            Message::FeeFilter(_) => "feefilter",
            Message::SendHeaders => "sendheaders",
            Message::SendCmpct { .. } => "sendcmpct",
            Message::CmpctBlock(_) => "cmpctblock",
            Message::GetBlockTxn(_) => "getblocktxn",
            Message::BlockTxn(_) => "blocktxn",
            Message::MerkleBlock(_) => "merkleblock",
        }
    }

    pub fn is_known_command(command: &str) -> bool {
        Self::COMMANDS.contains(&command)
    }

    /// Decode the payload of a frame carrying `command`.
    ///
    /// Returns `Ok(None)` for a command outside the catalog. A `ping`
    /// payload is read without a nonce when `legacy_ping` is set.
    pub fn decode_payload(
        command: &str,
        payload: &[u8],
        legacy_ping: bool,
    ) -> Result<Option<Self>, DecodeError> {
        let r = &mut &payload[..];
        let msg = match command {
            "version" => Message::Version(VersionMessage::decode(r)?),
            "verack" => Message::Verack,
            "protoconf" => Message::Protoconf(Protoconf::decode(r)?),
            "createstrm" => Message::CreateStream(CreateStream::decode(r)?),
            "streamack" => Message::StreamAck(StreamAck::decode(r)?),
            "addr" => Message::Addr(read_vec(r)?),
            "alert" => Message::Alert(Alert::decode(r)?),
            "inv" => Message::Inv(read_vec(r)?),
            "getdata" => Message::GetData(read_vec(r)?),
            "notfound" => Message::NotFound(read_vec(r)?),
            "getblocks" => Message::GetBlocks(LocatorRequest::decode(r)?),
            "getheaders" => Message::GetHeaders(LocatorRequest::decode(r)?),
            "tx" => Message::Tx(Transaction::decode(r)?),
            "block" => Message::Block(Block::decode(r)?),
            "headers" => {
                let blocks: Vec<Block> = read_vec(r)?;
                Message::Headers(blocks.into_iter().map(|b| b.header).collect())
            }
            "getaddr" => Message::GetAddr,
            "mempool" => Message::Mempool,
            "ping" if legacy_ping => Message::Ping(None),
            "ping" => Message::Ping(Some(read_u64(r)?)),
            "pong" => Message::Pong(read_u64(r)?),
            "reject" => Message::Reject(Reject::decode(r)?),
            "feefilter" => Message::FeeFilter(read_u64(r)?),
            "sendheaders" => Message::SendHeaders,
            "sendcmpct" => Message::SendCmpct {
                announce: read_bool(r)?,
                version: read_u64(r)?,
            },
            "cmpctblock" => Message::CmpctBlock(P2PHeaderAndShortIds::decode(r)?),
            "getblocktxn" => Message::GetBlockTxn(BlockTransactionsRequest::decode(r)?),
            "blocktxn" => Message::BlockTxn(BlockTransactions::decode(r)?),
            "merkleblock" => Message::MerkleBlock(MerkleBlock::decode(r)?),
            _ => return Ok(None),
        };
        Ok(Some(msg))
    }
}

impl Encodable for Message {
    fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            Message::Version(v) => v.encode(buf),
            Message::Protoconf(p) => p.encode(buf),
            Message::CreateStream(c) => c.encode(buf),
            Message::StreamAck(s) => s.encode(buf),
            Message::Addr(addrs) => write_vec(buf, addrs),
            Message::Alert(a) => a.encode(buf),
            Message::Inv(inv) | Message::GetData(inv) | Message::NotFound(inv) => {
                write_vec(buf, inv)
            }
            Message::GetBlocks(req) | Message::GetHeaders(req) => req.encode(buf),
            Message::Tx(tx) => tx.encode(buf),
            Message::Block(block) => block.encode(buf),
            Message::Headers(headers) => {
                // Each header travels as a block without transactions
                write_compact_size(buf, headers.len() as u64);
                for header in headers {
                    header.encode(buf);
                    write_compact_size(buf, 0);
                }
            }
            Message::Ping(nonce) => {
                if let Some(nonce) = nonce {
                    buf.put_u64_le(*nonce);
                }
            }
            Message::Pong(nonce) => buf.put_u64_le(*nonce),
            Message::Reject(r) => r.encode(buf),
            Message::FeeFilter(rate) => buf.put_u64_le(*rate),
            Message::SendCmpct { announce, version } => {
                buf.put_u8(*announce as u8);
                buf.put_u64_le(*version);
            }
            Message::CmpctBlock(c) => c.encode(buf),
            Message::GetBlockTxn(req) => req.encode(buf),
            Message::BlockTxn(txs) => txs.encode(buf),
            Message::MerkleBlock(mb) => mb.encode(buf),
            Message::Verack | Message::GetAddr | Message::Mempool | Message::SendHeaders => {}
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Message::Version(v) => write!(
                f,
                "msg_version(version={} services={} time={} addr_to={} user_agent={:?} start_height={:?} relay={} assoc_id={:?})",
                v.version,
                v.services.bits(),
                v.time,
                v.addr_to,
                v.user_agent,
                v.start_height,
                v.relay,
                v.association_id
            ),
            Message::Inv(inv) | Message::GetData(inv) | Message::NotFound(inv) => {
                write!(f, "msg_{}(inv=[", self.command())?;
                for (i, entry) in inv.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", entry)?;
                }
                write!(f, "])")
            }
            Message::Ping(Some(nonce)) => write!(f, "msg_ping(nonce={:016x})", nonce),
            Message::Ping(None) => write!(f, "msg_ping() (pre-bip31)"),
            Message::Pong(nonce) => write!(f, "msg_pong(nonce={:016x})", nonce),
            Message::Reject(r) => write!(
                f,
                "msg_reject: {} {} {} [{}]",
                r.message, r.code, r.reason, r.data
            ),
            other => write!(f, "msg_{}({:?})", other.command(), other),
        }
    }
}
