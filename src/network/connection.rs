//! Connection to a single peer
//!
//! [`NodeConnection`] is the per-peer state machine: buffers, state,
//! the negotiated wire versions and the frame codec. It performs no I/O
//! itself. The network thread moves bytes between the socket and the
//! buffers and calls back in when the socket becomes writable or data
//! arrives.

use super::codec::FrameCodec;
use super::config::{ConnectionConfig, Network};
use super::message::{Message, VersionMessage};
use crate::core::consensus::{BIP0031_VERSION, LEGACY_MAX_PROTOCOL_PAYLOAD_LENGTH};
use crate::core::{AssociationId, Inventory, ServiceFlags, VersionAddress};
use crate::wire::DecodeError;
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Idle time after which a ping is sent ahead of the next delivery
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Longest message representation written to the log
const LOG_REPR_LIMIT: usize = 500;

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Bad network magic")]
    BadMagic,
    #[error("Bad frame checksum")]
    BadChecksum,
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),
    #[error("Payload of {0} bytes is too large")]
    PayloadTooLarge(u32),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Not connected")]
    NotConnected,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}

impl ConnectionError {
    /// Framing errors mean the byte stream can no longer be trusted
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ConnectionError::BadMagic
                | ConnectionError::BadChecksum
                | ConnectionError::UnknownCommand(_)
                | ConnectionError::PayloadTooLarge(_)
        )
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Closed,
}

/// State of one peer connection
#[derive(Debug)]
pub struct NodeConnection {
    addr: SocketAddr,
    network: Network,
    state: ConnectionState,
    codec: FrameCodec,
    send_buf: BytesMut,
    recv_buf: BytesMut,
    last_sent: Option<Instant>,
    disconnect: bool,
    /// Services the peer announced
    pub services: ServiceFlags,
    pub max_inv_elements: usize,
    pub user_agent: Option<String>,
    pub association_id: Option<AssociationId>,
}

impl NodeConnection {
    /// Create a connection in the `Connecting` state.
    ///
    /// Our `version` is queued straight away unless the config disables
    /// it or names an existing association to join.
    pub fn new(addr: SocketAddr, config: &ConnectionConfig) -> Self {
        let mut conn = Self {
            addr,
            network: config.network,
            state: ConnectionState::Connecting,
            codec: FrameCodec::new(config.network),
            send_buf: BytesMut::new(),
            recv_buf: BytesMut::new(),
            last_sent: None,
            disconnect: false,
            services: ServiceFlags::empty(),
            max_inv_elements: Inventory::estimate_max_inv_elements(
                LEGACY_MAX_PROTOCOL_PAYLOAD_LENGTH,
            ),
            user_agent: config.user_agent.clone(),
            association_id: config.association_id,
        };

        if config.send_version && config.association_id.is_none() {
            let mut version = VersionMessage::new(VersionAddress::new(addr.ip(), addr.port()));
            version.services = config.services;
            version.start_height = Some(config.start_height);
            if let Some(agent) = &config.user_agent {
                version.user_agent = Some(agent.clone());
            }
            if config.null_association_id {
                version.association_id = None;
            }
            conn.association_id = version.association_id;
            if let Err(e) = conn.send_message(&Message::Version(version), true) {
                log::warn!("Failed to queue version for {}: {}", addr, e);
            }
        }
        conn
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Version governing frames we send
    pub fn ver_send(&self) -> i32 {
        self.codec.send_version()
    }

    pub fn set_ver_send(&mut self, version: i32) {
        self.codec.set_send_version(version);
    }

    /// Version governing frames we receive
    pub fn ver_recv(&self) -> i32 {
        self.codec.recv_version()
    }

    pub fn set_ver_recv(&mut self, version: i32) {
        self.codec.set_recv_version(version);
    }

    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// First writable edge; returns true if this call made the
    /// connection `Connected`
    pub fn handle_connect(&mut self) -> bool {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            return true;
        }
        false
    }

    /// Drop buffered data and enter the terminal `Closed` state
    pub fn handle_close(&mut self) {
        self.state = ConnectionState::Closed;
        self.send_buf.clear();
        self.recv_buf.clear();
    }

    /// Ask the network thread to close this connection
    pub fn disconnect_node(&mut self) {
        self.disconnect = true;
    }

    pub fn wants_disconnect(&self) -> bool {
        self.disconnect
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Frame `msg` into the send buffer.
    ///
    /// Only a connected peer accepts messages, unless
    /// `push_before_connect` is set for the opening handshake.
    pub fn send_message(
        &mut self,
        msg: &Message,
        push_before_connect: bool,
    ) -> Result<(), ConnectionError> {
        if self.state != ConnectionState::Connected && !push_before_connect {
            return Err(ConnectionError::NotConnected);
        }
        self.log_message("Send message to", msg);
        self.codec.encode(msg, &mut self.send_buf)?;
        self.last_sent = Some(Instant::now());
        Ok(())
    }

    /// True while there is something for the socket to do
    pub fn writable(&self) -> bool {
        self.state == ConnectionState::Connecting || !self.send_buf.is_empty()
    }

    pub fn pending_send(&self) -> &[u8] {
        &self.send_buf
    }

    /// Drop the first `n` bytes after the socket accepted them
    pub fn consume_sent(&mut self, n: usize) {
        self.send_buf.advance(n.min(self.send_buf.len()));
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    pub fn receive_bytes(&mut self, data: &[u8]) {
        self.recv_buf.extend_from_slice(data);
    }

    /// Next complete message in the receive buffer, if any
    pub fn next_message(&mut self) -> Result<Option<Message>, ConnectionError> {
        let result = self.codec.decode(&mut self.recv_buf);
        if let Err(ConnectionError::UnknownCommand(command)) = &result {
            log::warn!("Received unknown command from {}: '{}'", self.addr, command);
        }
        result
    }

    /// Bookkeeping done before a message reaches the callbacks: note
    /// pre-BIP31 peers, then ping if we have been quiet too long
    pub fn got_message(&mut self, msg: &Message, now: Instant) -> Result<(), ConnectionError> {
        if let Message::Version(version) = msg {
            if version.version <= BIP0031_VERSION {
                self.codec.set_legacy_ping(true);
            }
        }
        if self.keepalive_due(now) {
            let ping = if self.codec.legacy_ping() {
                Message::Ping(None)
            } else {
                Message::Ping(Some(0))
            };
            self.send_message(&ping, false)?;
        }
        self.log_message("Received message from", msg);
        Ok(())
    }

    fn keepalive_due(&self, now: Instant) -> bool {
        match self.last_sent {
            None => true,
            Some(sent) => now.saturating_duration_since(sent) > KEEPALIVE_INTERVAL,
        }
    }

    fn log_message(&self, direction: &str, msg: &Message) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let mut repr = msg.to_string();
        if repr.len() > LOG_REPR_LIMIT {
            let mut end = LOG_REPR_LIMIT;
            while !repr.is_char_boundary(end) {
                end -= 1;
            }
            repr.truncate(end);
            repr.push_str("... (msg truncated)");
        }
        log::debug!("{} {}: {}", direction, self.addr, repr);
    }
}
