//! Message callbacks and per-session message bookkeeping

use super::connection::{ConnectionError, NodeConnection};
use super::message::{Message, VersionMessage};
use crate::core::consensus::{BIP0031_VERSION, INITIAL_WIRE_VERSION, MY_VERSION};
use crate::core::{InvType, Inventory, Protoconf};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// =============================================================================
// Callbacks
// =============================================================================

/// Handlers invoked by the network thread for one connection.
///
/// Every method has a default. Override the ones whose behaviour should
/// change; [`NodeCallbacks::dispatch`] routes each message to its
/// handler.
pub trait NodeCallbacks: Send {
    fn on_open(&mut self, _conn: &mut NodeConnection) {}

    fn on_close(&mut self, _conn: &mut NodeConnection) {}

    /// Answer the handshake and settle the wire version
    fn on_version(
        &mut self,
        conn: &mut NodeConnection,
        msg: &VersionMessage,
    ) -> Result<(), ConnectionError> {
        if msg.version >= INITIAL_WIRE_VERSION {
            conn.send_message(&Message::Verack, false)?;
            conn.send_message(&Message::Protoconf(Protoconf::local()), false)?;
        }
        conn.set_ver_send(MY_VERSION.min(msg.version));
        if msg.version < INITIAL_WIRE_VERSION {
            conn.set_ver_recv(conn.ver_send());
        }
        conn.services = msg.services;
        Ok(())
    }

    fn on_verack(&mut self, conn: &mut NodeConnection) -> Result<(), ConnectionError> {
        conn.set_ver_recv(conn.ver_send());
        Ok(())
    }

    fn on_ping(
        &mut self,
        conn: &mut NodeConnection,
        nonce: Option<u64>,
    ) -> Result<(), ConnectionError> {
        if conn.ver_send() > BIP0031_VERSION {
            conn.send_message(&Message::Pong(nonce.unwrap_or(0)), false)?;
        }
        Ok(())
    }

    /// Request everything advertised except error entries
    fn on_inv(
        &mut self,
        conn: &mut NodeConnection,
        inv: &[Inventory],
    ) -> Result<(), ConnectionError> {
        let want: Vec<Inventory> = inv
            .iter()
            .filter(|entry| entry.inv_type != InvType::Error)
            .copied()
            .collect();
        if !want.is_empty() {
            conn.send_message(&Message::GetData(want), false)?;
        }
        Ok(())
    }

    /// Any message without a dedicated handler
    fn on_message(
        &mut self,
        _conn: &mut NodeConnection,
        _msg: &Message,
    ) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn dispatch(&mut self, conn: &mut NodeConnection, msg: &Message) -> Result<(), ConnectionError> {
        match msg {
            Message::Version(v) => self.on_version(conn, v),
            Message::Verack => self.on_verack(conn),
            Message::Ping(nonce) => self.on_ping(conn, *nonce),
            Message::Inv(inv) => self.on_inv(conn, inv),
            other => self.on_message(conn, other),
        }
    }
}

/// Callbacks with every default behaviour
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCallbacks;

impl NodeCallbacks for DefaultCallbacks {}

// =============================================================================
// Message Tracker
// =============================================================================

/// Counts, latest copy and arrival time of each command received
#[derive(Debug, Default)]
pub struct MessageTracker {
    /// Set between the open and close callbacks
    pub connected: bool,
    message_count: HashMap<&'static str, usize>,
    last_message: HashMap<&'static str, Message>,
    timestamps: HashMap<&'static str, DateTime<Utc>>,
    arrival: HashMap<&'static str, u64>,
    time_index: u64,
}

impl MessageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, msg: &Message) {
        let command = msg.command();
        *self.message_count.entry(command).or_insert(0) += 1;
        self.last_message.insert(command, msg.clone());
        self.timestamps.insert(command, Utc::now());
        self.arrival.insert(command, self.time_index);
        self.time_index += 1;
    }

    pub fn message_count(&self, command: &str) -> usize {
        self.message_count.get(command).copied().unwrap_or(0)
    }

    pub fn last_message(&self, command: &str) -> Option<&Message> {
        self.last_message.get(command)
    }

    pub fn received_at(&self, command: &str) -> Option<DateTime<Utc>> {
        self.timestamps.get(command).copied()
    }

    /// Position of the latest `command` in overall arrival order
    pub fn arrival_index(&self, command: &str) -> Option<u64> {
        self.arrival.get(command).copied()
    }

    pub fn verack_received(&self) -> bool {
        self.message_count("verack") > 0
    }

    /// Nonce of the most recent `pong`
    pub fn last_pong(&self) -> Option<u64> {
        match self.last_message("pong") {
            Some(Message::Pong(nonce)) => Some(*nonce),
            _ => None,
        }
    }

    /// Reset the counters; latest messages are kept
    pub fn clear_messages(&mut self) {
        self.message_count.clear();
    }
}
