//! The event loop: wait for readiness, accept, read, dispatch, prune.
//!
//! Everything runs on one task. The registry is owned by [`Server`] and lent
//! to the session and dispatch code for the duration of one read, so a
//! connection is never removed while another part of the pass iterates it.

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::handlers::Outcome;
use crate::multiplexer::wait_ready;
use crate::protocol::Response;
use crate::registry::{ConnectionId, Registry};
use crate::session::handle_input;
use crate::{Error, Result};

pub struct Server {
    listener: TcpListener,
    registry: Registry<TcpStream>,
    config: Config,
    read_buf: Vec<u8>,
}

impl Server {
    /// Creates, binds and starts listening on the configured address.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;
        let addr = config.socket_addr()?;
        let bind_err = |source: io::Error| Error::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(config.backlog).map_err(bind_err)?;

        info!(addr = %listener.local_addr()?, backlog = config.backlog, "chat server started");

        Ok(Self {
            listener,
            registry: Registry::new(),
            read_buf: vec![0; config.read_buffer_size],
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Registry<TcpStream> {
        &self.registry
    }

    /// Runs until a fatal error.
    pub async fn run(mut self) -> Result<()> {
        loop {
            self.tick().await?;
        }
    }

    /// One pass: a single readiness wait followed by full handling of every
    /// ready descriptor.
    pub async fn tick(&mut self) -> Result<()> {
        let readiness =
            wait_ready(&self.listener, &self.registry, self.config.poll_timeout()).await?;

        if readiness.is_idle() {
            trace!(
                connections = self.registry.len(),
                max_id = ?self.registry.max_id(),
                "liveness tick"
            );
            return Ok(());
        }

        if let Some((stream, addr)) = readiness.accepted {
            self.accept(stream, addr);
        }

        for id in readiness.ready {
            self.service(id);
        }

        Ok(())
    }

    fn accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%addr, error = %e, "failed to set TCP_NODELAY");
        }

        let id = self.registry.add(stream, Some(addr));
        info!(connection = %id, %addr, "client connected");

        if let Some(conn) = self.registry.get(id) {
            conn.send(&Response::NamePrompt);
        }
    }

    fn service(&mut self, id: ConnectionId) {
        // Gone already if it sent /close earlier in this pass.
        let Some(conn) = self.registry.get(id) else {
            return;
        };

        match conn.peer().try_read(&mut self.read_buf) {
            Ok(0) => self.disconnect(id, None),
            Ok(n) => {
                let outcome =
                    handle_input(&mut self.registry, id, &self.read_buf[..n], &self.config);
                if outcome == Outcome::Closed {
                    debug!(connection = %id, "connection closed on request");
                }
            }
            // Stale readiness from the previous pass.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => self.disconnect(id, Some(e)),
        }
    }

    fn disconnect(&mut self, id: ConnectionId, error: Option<io::Error>) {
        if let Some(conn) = self.registry.remove(id) {
            match error {
                Some(e) => debug!(connection = %id, name = conn.name(), error = %e, "read failed"),
                None => debug!(connection = %id, name = conn.name(), "peer closed"),
            }
            info!(
                connection = %id,
                addr = ?conn.addr(),
                name = conn.name(),
                state = conn.state().as_str(),
                remaining = self.registry.len(),
                "client disconnected"
            );
        }
    }
}
