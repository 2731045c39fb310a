//! Network thread and connection registry
//!
//! One task drives every socket. Callers register connections and then
//! talk to them through a [`SessionHandle`], polling the session's
//! tracker to see what arrived.
//!
//! Locking follows a two-step handoff. The loop holds `active` for a
//! whole iteration and only briefly lets go of it, so it first takes and
//! drops `intent`. A caller that holds `intent` therefore gets `active`
//! within one iteration. Per-connection state sits behind its own
//! `std::sync::Mutex`, which is never held across an await.

use super::callbacks::{MessageTracker, NodeCallbacks};
use super::config::{ConnectionConfig, NetworkThreadConfig};
use super::connection::{ConnectionError, ConnectionState, NodeConnection};
use super::message::Message;
use futures::future::select_all;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Interval between predicate checks in [`SessionHandle::wait_until`]
const CHECK_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// Session
// =============================================================================

/// A connection together with its callbacks and received-message state
pub struct Session {
    pub conn: NodeConnection,
    pub tracker: MessageTracker,
    callbacks: Box<dyn NodeCallbacks>,
}

impl Session {
    pub fn new(conn: NodeConnection, callbacks: Box<dyn NodeCallbacks>) -> Self {
        Self {
            conn,
            tracker: MessageTracker::new(),
            callbacks,
        }
    }

    fn open(&mut self) {
        self.tracker.connected = true;
        self.callbacks.on_open(&mut self.conn);
    }

    fn close(&mut self) {
        self.conn.handle_close();
        self.tracker.connected = false;
        self.callbacks.on_close(&mut self.conn);
    }

    /// Decode and deliver every complete message in the receive buffer
    fn process_received(&mut self) -> Result<(), ConnectionError> {
        while let Some(msg) = self.conn.next_message()? {
            self.conn.got_message(&msg, Instant::now())?;
            self.tracker.record(&msg);
            self.callbacks.dispatch(&mut self.conn, &msg)?;
        }
        Ok(())
    }
}

fn lock_session(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Registry
// =============================================================================

type Readiness<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

struct Entry {
    stream: TcpStream,
    session: Arc<Mutex<Session>>,
}

/// Owns every active connection and the loop that polls them
pub struct ConnectionRegistry {
    config: NetworkThreadConfig,
    intent: tokio::sync::Mutex<()>,
    active: tokio::sync::Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
    stop: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new(config: NetworkThreadConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            intent: tokio::sync::Mutex::new(()),
            active: tokio::sync::Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        })
    }

    /// Open a TCP connection and hand it to the loop
    pub async fn connect(
        &self,
        addr: SocketAddr,
        config: &ConnectionConfig,
        callbacks: Box<dyn NodeCallbacks>,
    ) -> Result<SessionHandle, ConnectionError> {
        let conn = NodeConnection::new(addr, config);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        log::info!("Connected to {} on {}", addr, config.network);
        Ok(self.register(stream, Session::new(conn, callbacks)).await)
    }

    /// Add an already connected stream
    pub async fn register(&self, stream: TcpStream, session: Session) -> SessionHandle {
        let session = Arc::new(Mutex::new(session));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let _intent = self.intent.lock().await;
        let mut active = self.active.lock().await;
        active.insert(
            id,
            Entry {
                stream,
                session: Arc::clone(&session),
            },
        );
        SessionHandle::new(id, session)
    }

    pub async fn connection_count(&self) -> usize {
        let _intent = self.intent.lock().await;
        self.active.lock().await.len()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Run the loop on the current runtime until [`stop`](Self::stop)
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.run().await })
    }

    pub async fn run(&self) {
        while !self.is_stopped() {
            drop(self.intent.lock().await);
            let mut active = self.active.lock().await;
            self.poll_once(&mut active).await;
        }
        log::debug!("Network thread closing");
    }

    async fn poll_once(&self, active: &mut HashMap<u64, Entry>) {
        let mut closed = Vec::new();
        for (id, entry) in active.iter() {
            let mut session = lock_session(&entry.session);
            if session.conn.wants_disconnect() {
                session.close();
                closed.push(*id);
            }
        }
        self.remove(active, &closed);

        if active.is_empty() {
            tokio::time::sleep(self.config.poll_timeout).await;
            return;
        }

        self.wait_ready(active).await;

        let mut buf = vec![0u8; self.config.read_buffer_size];
        let mut closed = Vec::new();
        for (id, entry) in active.iter() {
            let mut session = lock_session(&entry.session);
            if let Err(e) = Self::service(&entry.stream, &mut session, &mut buf) {
                match &e {
                    ConnectionError::Io(io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
                        log::info!("Peer {} closed the connection", session.conn.addr());
                    }
                    _ => log::warn!("Closing connection to {}: {}", session.conn.addr(), e),
                }
                session.close();
                closed.push(*id);
            }
        }
        self.remove(active, &closed);
    }

    /// Wait until some socket is ready or the poll timeout passes.
    /// Connections with queued output wait for writability instead of
    /// readability.
    async fn wait_ready(&self, active: &HashMap<u64, Entry>) {
        let waits = active.values().map(|entry| {
            let wants_write = lock_session(&entry.session).conn.writable();
            let ready: Readiness<'_> = if wants_write {
                Box::pin(entry.stream.writable())
            } else {
                Box::pin(entry.stream.readable())
            };
            ready
        });
        // Readiness errors surface again on the next read or write
        let _ = tokio::time::timeout(self.config.poll_timeout, select_all(waits)).await;
    }

    /// One write-then-read pass over a connection
    fn service(
        stream: &TcpStream,
        session: &mut Session,
        buf: &mut [u8],
    ) -> Result<(), ConnectionError> {
        if session.conn.handle_connect() {
            session.open();
        }

        if session.conn.writable() && !session.conn.pending_send().is_empty() {
            match stream.try_write(session.conn.pending_send()) {
                Ok(n) => session.conn.consume_sent(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }
        }

        loop {
            match stream.try_read(buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => {
                    session.conn.receive_bytes(&buf[..n]);
                    session.process_received()?;
                    if n < buf.len() {
                        return Ok(());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn remove(&self, active: &mut HashMap<u64, Entry>, ids: &[u64]) {
        for id in ids {
            active.remove(id);
        }
    }
}

// =============================================================================
// Session Handle
// =============================================================================

/// Caller side of one registered connection
pub struct SessionHandle {
    id: u64,
    session: Arc<Mutex<Session>>,
    ping_counter: u64,
}

impl SessionHandle {
    fn new(id: u64, session: Arc<Mutex<Session>>) -> Self {
        Self {
            id,
            session,
            ping_counter: 1,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run `f` with the session locked
    pub fn with<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut lock_session(&self.session))
    }

    pub fn send_message(&self, msg: &Message) -> Result<(), ConnectionError> {
        self.with(|s| s.conn.send_message(msg, false))
    }

    /// Ask the network thread to close the connection
    pub fn disconnect(&self) {
        self.with(|s| s.conn.disconnect_node());
    }

    pub fn is_connected(&self) -> bool {
        self.with(|s| s.tracker.connected)
    }

    pub fn message_count(&self, command: &str) -> usize {
        self.with(|s| s.tracker.message_count(command))
    }

    pub fn last_message(&self, command: &str) -> Option<Message> {
        self.with(|s| s.tracker.last_message(command).cloned())
    }

    pub fn clear_messages(&self) {
        self.with(|s| s.tracker.clear_messages());
    }

    /// Poll `predicate` under the session lock until it holds or
    /// `timeout` passes
    pub async fn wait_until<F>(
        &self,
        label: &'static str,
        timeout: Duration,
        mut predicate: F,
    ) -> Result<(), ConnectionError>
    where
        F: FnMut(&Session) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if self.with(|s| predicate(s)) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ConnectionError::Timeout(label));
            }
            tokio::time::sleep(CHECK_INTERVAL).await;
        }
    }

    pub async fn wait_for_verack(&self, timeout: Duration) -> Result<(), ConnectionError> {
        self.wait_until("verack", timeout, |s| s.tracker.verack_received())
            .await
    }

    pub async fn wait_for_disconnect(&self, timeout: Duration) -> Result<(), ConnectionError> {
        self.wait_until("disconnect", timeout, |s| {
            s.conn.state() == ConnectionState::Closed
        })
        .await
    }

    /// Ping and wait for the matching pong, proving the peer has
    /// processed everything sent before
    pub async fn sync_with_ping(&mut self, timeout: Duration) -> Result<(), ConnectionError> {
        let nonce = self.ping_counter;
        self.send_message(&Message::Ping(Some(nonce)))?;
        self.wait_until("pong", timeout, |s| s.tracker.last_pong() == Some(nonce))
            .await?;
        self.ping_counter += 1;
        Ok(())
    }

    pub async fn send_and_ping(
        &mut self,
        msg: &Message,
        timeout: Duration,
    ) -> Result<(), ConnectionError> {
        self.send_message(msg)?;
        self.sync_with_ping(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VersionAddress;
    use crate::network::callbacks::DefaultCallbacks;
    use crate::network::codec::FrameCodec;
    use crate::network::config::Network;
    use crate::network::message::VersionMessage;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config() -> NetworkThreadConfig {
        NetworkThreadConfig {
            poll_timeout: Duration::from_millis(20),
            ..NetworkThreadConfig::default()
        }
    }

    /// Minimal peer: answers our version and echoes pings, then records
    /// what it saw once the connection drops
    async fn fake_peer(listener: TcpListener) -> Vec<&'static str> {
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, FrameCodec::new(Network::Regtest));
        let mut seen = Vec::new();

        while let Some(Ok(msg)) = framed.next().await {
            seen.push(msg.command());
            match msg {
                Message::Version(_) => {
                    let mut reply = VersionMessage::new(VersionAddress::default());
                    reply.version = 70015;
                    framed.send(&Message::Version(reply)).await.unwrap();
                    framed.send(&Message::Verack).await.unwrap();
                }
                Message::Ping(Some(nonce)) => {
                    framed.send(&Message::Pong(nonce)).await.unwrap();
                }
                _ => {}
            }
        }
        seen
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_loopback_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(fake_peer(listener));

        let registry = ConnectionRegistry::new(fast_config());
        let worker = registry.spawn();

        let config = ConnectionConfig::for_network(Network::Regtest);
        let mut handle = registry
            .connect(addr, &config, Box::new(DefaultCallbacks))
            .await
            .unwrap();

        handle.wait_for_verack(WAIT).await.unwrap();
        handle.sync_with_ping(WAIT).await.unwrap();
        handle.send_and_ping(&Message::Mempool, WAIT).await.unwrap();

        assert!(handle.is_connected());
        assert_eq!(handle.message_count("version"), 1);
        assert_eq!(handle.message_count("pong"), 2);
        handle.with(|s| {
            assert_eq!(s.conn.ver_send(), 70015);
            assert_eq!(s.conn.ver_recv(), 70015);
        });

        handle.disconnect();
        handle.wait_for_disconnect(WAIT).await.unwrap();
        assert_eq!(registry.connection_count().await, 0);

        let seen = peer.await.unwrap();
        assert_eq!(
            seen,
            vec!["version", "verack", "protoconf", "ping", "mempool", "ping"]
        );

        registry.stop();
        worker.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peer_close_removes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let registry = ConnectionRegistry::new(fast_config());
        let worker = registry.spawn();
        let handle = registry
            .connect(addr, &ConnectionConfig::default(), Box::new(DefaultCallbacks))
            .await
            .unwrap();
        peer.await.unwrap();

        handle.wait_for_disconnect(WAIT).await.unwrap();
        assert_eq!(registry.connection_count().await, 0);
        assert!(matches!(
            handle.send_message(&Message::Verack),
            Err(ConnectionError::NotConnected)
        ));

        registry.stop();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let conn = NodeConnection::new(
            "127.0.0.1:1".parse().unwrap(),
            &ConnectionConfig::default(),
        );
        let handle = SessionHandle::new(0, Arc::new(Mutex::new(Session::new(
            conn,
            Box::new(DefaultCallbacks),
        ))));
        let result = handle
            .wait_for_verack(Duration::from_millis(120))
            .await;
        assert!(matches!(result, Err(ConnectionError::Timeout("verack"))));
    }
}
