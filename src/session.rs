//! Per-connection session state machine.
//!
//! A connection starts `Unauthenticated`. Its first non-empty line is taken as
//! the nickname, verbatim apart from control-byte stripping, and is never
//! parsed as a command. After that every line goes to the dispatcher.

use tracing::{debug, info};

use crate::config::Config;
use crate::constants::SessionState;
use crate::handlers::{Outcome, handle_command};
use crate::protocol::{Response, strip_control};
use crate::registry::{ConnectionId, Peer, Registry};

/// Feed one raw read from `id` through the session state machine.
pub fn handle_input<P: Peer>(
    registry: &mut Registry<P>,
    id: ConnectionId,
    raw: &[u8],
    config: &Config,
) -> Outcome {
    let line = strip_control(raw);

    let Some(conn) = registry.get_mut(id) else {
        return Outcome::Closed;
    };

    match conn.state() {
        SessionState::Unauthenticated => {
            register_name(registry, id, line, config);
            Outcome::Continue
        }
        SessionState::Active => {
            conn.record_message();
            handle_command(registry, id, &line)
        }
    }
}

fn register_name<P: Peer>(
    registry: &mut Registry<P>,
    id: ConnectionId,
    name: String,
    config: &Config,
) {
    let taken = config.reject_duplicate_names && registry.find_by_name(&name).is_some();

    let Some(conn) = registry.get_mut(id) else {
        return;
    };

    // An empty name would be indistinguishable from "not yet named".
    if name.is_empty() {
        debug!(connection = %id, "empty nickname line, prompting again");
        conn.send(&Response::NamePrompt);
        return;
    }

    if taken {
        debug!(connection = %id, name = %name, "nickname refused, already in use");
        conn.send(&Response::NameTaken);
        return;
    }

    conn.activate(name);
    info!(connection = %id, name = conn.name(), "client named");
    conn.send(&Response::Welcome { name: conn.name() });
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio::sync::mpsc;

    type Rx = mpsc::UnboundedReceiver<BytesMut>;
    type TestRegistry = Registry<mpsc::UnboundedSender<BytesMut>>;

    fn connect(registry: &mut TestRegistry) -> (ConnectionId, Rx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (registry.add(tx, None), rx)
    }

    fn drain(rx: &mut Rx) -> String {
        let mut out = String::new();
        while let Ok(msg) = rx.try_recv() {
            out.push_str(std::str::from_utf8(&msg).unwrap());
        }
        out
    }

    #[test]
    fn test_first_line_becomes_name() {
        let config = Config::default();
        let mut registry = TestRegistry::new();
        let (id, mut rx) = connect(&mut registry);

        handle_input(&mut registry, id, b"Alice\r\n", &config);

        let conn = registry.get(id).unwrap();
        assert_eq!(conn.state(), SessionState::Active);
        assert_eq!(conn.name(), "Alice");
        assert_eq!(conn.messages(), 1);
        assert!(drain(&mut rx).starts_with("Hello, Alice!"));
    }

    #[test]
    fn test_first_line_is_never_a_command() {
        let config = Config::default();
        let mut registry = TestRegistry::new();
        let (other, mut other_rx) = connect(&mut registry);
        handle_input(&mut registry, other, b"Bob", &config);
        drain(&mut other_rx);

        let (id, _rx) = connect(&mut registry);
        assert_eq!(
            handle_input(&mut registry, id, b"/message_all x\n", &config),
            Outcome::Continue
        );
        assert_eq!(registry.get(id).unwrap().name(), "/message_all x");
        assert_eq!(drain(&mut other_rx), "");

        let (closer, _closer_rx) = connect(&mut registry);
        handle_input(&mut registry, closer, b"/close", &config);
        assert_eq!(registry.get(closer).unwrap().name(), "/close");
    }

    #[test]
    fn test_second_line_is_dispatched() {
        let config = Config::default();
        let mut registry = TestRegistry::new();
        let (id, mut rx) = connect(&mut registry);

        handle_input(&mut registry, id, b"Alice", &config);
        drain(&mut rx);
        handle_input(&mut registry, id, b"/members_count\n", &config);

        assert_eq!(drain(&mut rx), "Number of members on chat: 1\n");
        assert_eq!(registry.get(id).unwrap().messages(), 2);
    }

    #[test]
    fn test_name_is_kept_after_commands() {
        let config = Config::default();
        let mut registry = TestRegistry::new();
        let (id, _rx) = connect(&mut registry);

        handle_input(&mut registry, id, b"Alice", &config);
        handle_input(&mut registry, id, b"Mallory", &config);
        assert_eq!(registry.get(id).unwrap().name(), "Alice");
    }

    #[test]
    fn test_empty_name_reprompts() {
        let config = Config::default();
        let mut registry = TestRegistry::new();
        let (id, mut rx) = connect(&mut registry);

        handle_input(&mut registry, id, b"\r\n", &config);

        let conn = registry.get(id).unwrap();
        assert_eq!(conn.state(), SessionState::Unauthenticated);
        assert_eq!(conn.name(), "");
        assert_eq!(conn.messages(), 0);
        assert!(drain(&mut rx).contains("nickname"));
    }

    #[test]
    fn test_duplicate_names_allowed_by_default() {
        let config = Config::default();
        let mut registry = TestRegistry::new();
        let (a, _a_rx) = connect(&mut registry);
        let (b, _b_rx) = connect(&mut registry);

        handle_input(&mut registry, a, b"dup", &config);
        handle_input(&mut registry, b, b"dup", &config);

        assert!(registry.get(b).unwrap().state().is_active());
        assert_eq!(registry.find_by_name("dup"), Some(a));
    }

    #[test]
    fn test_duplicate_names_rejected_when_configured() {
        let config = Config {
            reject_duplicate_names: true,
            ..Config::default()
        };
        let mut registry = TestRegistry::new();
        let (a, _a_rx) = connect(&mut registry);
        let (b, mut b_rx) = connect(&mut registry);

        handle_input(&mut registry, a, b"dup", &config);
        handle_input(&mut registry, b, b"dup", &config);

        assert_eq!(drain(&mut b_rx), "Nickname is already taken\n");
        assert!(!registry.get(b).unwrap().state().is_active());
        assert_eq!(registry.get(b).unwrap().messages(), 0);

        handle_input(&mut registry, b, b"other", &config);
        assert_eq!(registry.get(b).unwrap().name(), "other");
        assert_eq!(registry.get(b).unwrap().messages(), 1);
    }
}
