//! P2P networking module
//!
//! Speaks the Bitcoin SV peer protocol to remote nodes.
//!
//! # Features
//! - Closed message catalog with byte-exact payload codecs
//! - Frame codec with version-gated checksums
//! - Per-peer connection state machine and handshake handling
//! - Overridable message callbacks with receive bookkeeping
//! - A single polling task driving every connection

pub mod callbacks;
pub mod codec;
pub mod config;
pub mod connection;
pub mod message;
pub mod thread;

pub use callbacks::{DefaultCallbacks, MessageTracker, NodeCallbacks};
pub use codec::{FrameCodec, COMMAND_SIZE, MAX_FRAME_PAYLOAD};
pub use config::{ConnectionConfig, Network, NetworkThreadConfig};
pub use connection::{ConnectionError, ConnectionState, NodeConnection, KEEPALIVE_INTERVAL};
pub use message::{CreateStream, LocatorRequest, Message, Reject, StreamAck, VersionMessage};
pub use thread::{ConnectionRegistry, Session, SessionHandle};
