//! Readiness multiplexer: one bounded wait over the listener and every
//! registered socket.

use std::future::poll_fn;
use std::net::SocketAddr;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::registry::{ConnectionId, Registry};
use crate::{Error, Result};

/// Result of one readiness wait.
#[derive(Debug, Default)]
pub struct Readiness {
    /// Connection pulled off the listener, if it was ready.
    pub accepted: Option<(TcpStream, SocketAddr)>,
    /// Registered connections with input (or EOF/error) pending.
    pub ready: Vec<ConnectionId>,
}

impl Readiness {
    /// Nothing happened before the timeout.
    pub fn is_idle(&self) -> bool {
        self.accepted.is_none() && self.ready.is_empty()
    }
}

/// Waits up to `timeout` for the listener or any registered connection to
/// become readable.
///
/// At most one connection is accepted per call. A timeout yields an idle
/// `Readiness`; an accept failure is returned as [`Error::Accept`].
pub async fn wait_ready(
    listener: &TcpListener,
    registry: &Registry<TcpStream>,
    timeout: Duration,
) -> Result<Readiness> {
    let wait = poll_fn(|cx| poll_ready(listener, registry, cx));

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Ok(Readiness::default()),
    }
}

fn poll_ready(
    listener: &TcpListener,
    registry: &Registry<TcpStream>,
    cx: &mut Context<'_>,
) -> Poll<Result<Readiness>> {
    let accepted = match listener.poll_accept(cx) {
        Poll::Ready(Ok(pair)) => Some(pair),
        Poll::Ready(Err(e)) => return Poll::Ready(Err(Error::Accept(e))),
        Poll::Pending => None,
    };

    // Every socket is polled so each one registers the waker for this wait.
    // Tokio keeps read readiness set after a read that did not drain the
    // socket, so the pass after a read usually reports the same socket again
    // and its `try_read` returns `WouldBlock`, clearing it. An errored socket
    // also counts as ready; the following read reports the error.
    let ready: Vec<ConnectionId> = if registry.is_empty() {
        Vec::new()
    } else {
        registry
            .all()
            .filter(|(_, conn)| conn.peer().poll_read_ready(cx).is_ready())
            .map(|(id, _)| id)
            .collect()
    };

    let readiness = Readiness { accepted, ready };
    if readiness.is_idle() {
        Poll::Pending
    } else {
        Poll::Ready(Ok(readiness))
    }
}
