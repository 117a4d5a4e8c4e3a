//! Protocol constants and enumerations.

use std::time::Duration;

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 8080;

/// Default address the listener binds to.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Pending-connection queue length passed to `listen`.
pub const DEFAULT_BACKLOG: u32 = 10;

/// Upper bound on a single readiness wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Bytes read from a connection per readiness event.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Prompt sent right after a connection is accepted.
pub const NAME_PROMPT: &str = "Welcome to online chat! Please enter your nickname:";

/// Sent when a duplicate nickname is refused.
pub const NAME_TAKEN: &str = "Nickname is already taken";

/// Sent when `/message` names a recipient nobody is using.
pub const INVALID_RECEIVER: &str = "Invalid nickname of receiver";

/// Acknowledgement sent before a `/close` teardown.
pub const DISCONNECT_ACK: &str = "Disconnect from online chat";

/// Reply to any verb outside the command set.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Lifecycle of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Connected, waiting for the nickname line.
    #[default]
    Unauthenticated,
    /// Named; every further line is a command.
    Active,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Active => "active",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

/// Command verbs understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    MembersCount,
    MembersList,
    MessageAll,
    Message,
    Close,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::MembersCount => "/members_count",
            Verb::MembersList => "/members_list",
            Verb::MessageAll => "/message_all",
            Verb::Message => "/message",
            Verb::Close => "/close",
        }
    }

    /// Exact, case-sensitive match against the verb set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "/members_count" => Some(Verb::MembersCount),
            "/members_list" => Some(Verb::MembersList),
            "/message_all" => Some(Verb::MessageAll),
            "/message" => Some(Verb::Message),
            "/close" => Some(Verb::Close),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_roundtrip() {
        for verb in [
            Verb::MembersCount,
            Verb::MembersList,
            Verb::MessageAll,
            Verb::Message,
            Verb::Close,
        ] {
            assert_eq!(Verb::parse(verb.as_str()), Some(verb));
        }
    }

    #[test]
    fn test_verb_is_case_sensitive() {
        assert_eq!(Verb::parse("/CLOSE"), None);
        assert_eq!(Verb::parse("/Message"), None);
        assert_eq!(Verb::parse("close"), None);
    }

    #[test]
    fn test_default_session_state() {
        assert_eq!(SessionState::default(), SessionState::Unauthenticated);
        assert!(!SessionState::default().is_active());
    }
}
