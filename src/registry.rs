//! Client registry: the live set of connections and their session state.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::constants::SessionState;
use crate::protocol::{MessageWrite, Response};

/// Identifier assigned to a connection on accept. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The write side of a connection.
///
/// Delivery is best-effort and must never block the event loop.
pub trait Peer {
    fn deliver(&self, msg: &[u8]) -> io::Result<()>;
}

/// Writes go straight to the socket with a non-blocking `send`. Tokio's
/// `try_write` would refuse with `WouldBlock` until the reactor has reported
/// write readiness, which a freshly accepted stream does not have yet.
impl Peer for TcpStream {
    fn deliver(&self, msg: &[u8]) -> io::Result<()> {
        let socket = SockRef::from(self);
        let mut written = 0;
        while written < msg.len() {
            match socket.send(&msg[written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => written += n,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// In-process peer: every message is pushed onto a channel.
impl Peer for mpsc::UnboundedSender<BytesMut> {
    fn deliver(&self, msg: &[u8]) -> io::Result<()> {
        self.send(BytesMut::from(msg))
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

/// One accepted client and its session.
#[derive(Debug)]
pub struct Connection<P> {
    id: ConnectionId,
    addr: Option<SocketAddr>,
    name: String,
    state: SessionState,
    messages: u64,
    peer: P,
}

impl<P: Peer> Connection<P> {
    fn new(id: ConnectionId, peer: P, addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            addr,
            name: String::new(),
            state: SessionState::Unauthenticated,
            messages: 0,
            peer,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Empty exactly while the connection is unauthenticated.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Lines accepted since naming, the naming line included. Zero while
    /// unauthenticated.
    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn peer(&self) -> &P {
        &self.peer
    }

    pub(crate) fn record_message(&mut self) {
        self.messages += 1;
    }

    /// Sets the nickname and moves the session to `Active`. Only valid once.
    pub(crate) fn activate(&mut self, name: String) {
        debug_assert!(!self.state.is_active());
        self.name = name;
        self.state = SessionState::Active;
        self.messages += 1;
    }

    /// Best-effort send; a failure is logged and otherwise ignored. The next
    /// read on a dead socket prunes the connection.
    pub fn send(&self, response: &Response<'_>) -> bool {
        let mut buf = BytesMut::new();
        response.write_message(&mut buf);
        self.send_raw(&buf)
    }

    pub fn send_raw(&self, msg: &[u8]) -> bool {
        match self.peer.deliver(msg) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection = %self.id, error = %e, "send failed");
                false
            }
        }
    }
}

/// Live connections keyed by id. Iteration is in ascending id order, i.e.
/// connection order.
#[derive(Debug)]
pub struct Registry<P> {
    connections: BTreeMap<ConnectionId, Connection<P>>,
    next_id: u32,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self {
            connections: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<P: Peer> Registry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted connection as unauthenticated.
    pub fn add(&mut self, peer: P, addr: Option<SocketAddr>) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.connections.insert(id, Connection::new(id, peer, addr));
        id
    }

    /// Removes the connection. Dropping the returned value closes its socket.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection<P>> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection<P>> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<P>> {
        self.connections.get_mut(&id)
    }

    /// First active connection using `name`, in connection order.
    pub fn find_by_name(&self, name: &str) -> Option<ConnectionId> {
        self.connections
            .values()
            .find(|c| c.state.is_active() && c.name == name)
            .map(|c| c.id)
    }

    pub fn all(&self) -> impl Iterator<Item = (ConnectionId, &Connection<P>)> {
        self.connections.iter().map(|(id, c)| (*id, c))
    }

    /// Names of active connections in connection order.
    pub fn names(&self) -> Vec<&str> {
        self.connections
            .values()
            .filter(|c| c.state.is_active())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Highest id currently registered.
    pub fn max_id(&self) -> Option<ConnectionId> {
        self.connections.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
