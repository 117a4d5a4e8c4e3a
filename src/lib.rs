//! # linechat
//!
//! A single-process, line-oriented TCP chat server.
//!
//! Clients connect, send a nickname as their first line, and then issue
//! commands (`/members_count`, `/members_list`, `/message`, `/message_all`,
//! `/close`). All connections are served from one task by a readiness loop
//! with a bounded wait; there is no per-connection task and no locking.

pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod multiplexer;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use protocol::{Command, MessageWrite, Response};
pub use registry::{Connection, ConnectionId, Peer, Registry};
pub use server::Server;
