//! Command dispatch for named connections.

use tracing::{debug, info};

use crate::protocol::{Command, MessageWrite, Response};
use crate::registry::{ConnectionId, Peer, Registry};

/// What the event loop should do with a connection after handling its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// The connection has already been removed from the registry.
    Closed,
}

/// Parse one sanitized line from an active connection and route it.
pub fn handle_command<P: Peer>(
    registry: &mut Registry<P>,
    id: ConnectionId,
    line: &str,
) -> Outcome {
    let Some(sender) = registry.get(id) else {
        return Outcome::Closed;
    };

    let command = Command::parse(line);
    debug!(connection = %id, sender = sender.name(), verb = command.verb(), "command");

    match command {
        Command::MembersCount => {
            sender.send(&Response::MembersCount(registry.len()));
        }

        Command::MembersList => {
            sender.send(&Response::MembersList(registry.names()));
        }

        Command::MessageAll { body } => {
            let msg = Response::Message {
                sender: sender.name(),
                body,
            }
            .to_bytes();

            for (other, conn) in registry.all() {
                if other != id {
                    conn.send_raw(&msg);
                }
            }
        }

        Command::Message { recipient, body } => match registry.find_by_name(recipient) {
            Some(target) => {
                if let Some(conn) = registry.get(target) {
                    conn.send(&Response::Message {
                        sender: sender.name(),
                        body,
                    });
                }
            }
            None => {
                sender.send(&Response::InvalidReceiver);
            }
        },

        Command::Close => {
            sender.send(&Response::Disconnect);
            if let Some(conn) = registry.remove(id) {
                info!(connection = %id, name = conn.name(), "client closed session");
            }
            return Outcome::Closed;
        }

        Command::Unknown { .. } => {
            sender.send(&Response::UnknownCommand);
        }
    }

    Outcome::Continue
}
