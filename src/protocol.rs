//! Line protocol: input sanitizing, command parsing and response encoding.
//!
//! Every read from a client is one logical message. Control bytes (< 32) are
//! stripped and the remainder is decoded lossily. Server lines always end with
//! a newline.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{
    DISCONNECT_ACK, INVALID_RECEIVER, NAME_PROMPT, NAME_TAKEN, UNKNOWN_COMMAND, Verb,
};

/// Removes every byte below 32 and decodes the rest as UTF-8, replacing
/// invalid sequences.
///
/// Bytes below 32 never occur inside a multi-byte UTF-8 sequence, so filtering
/// before decoding cannot split a character.
pub fn strip_control(raw: &[u8]) -> String {
    let kept: Vec<u8> = raw.iter().copied().filter(|b| *b >= 32).collect();
    String::from_utf8_lossy(&kept).into_owned()
}

/// A single parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    MembersCount,
    MembersList,
    MessageAll { body: &'a str },
    Message { recipient: &'a str, body: &'a str },
    Close,
    Unknown { verb: &'a str },
}

impl<'a> Command<'a> {
    /// Parses a sanitized line. Arguments are whatever follows the verb with
    /// exactly one separator removed; trailing arguments on argument-less verbs
    /// are ignored.
    pub fn parse(line: &'a str) -> Self {
        let (verb, rest) = split_token(line);

        match Verb::parse(verb) {
            Some(Verb::MembersCount) => Command::MembersCount,
            Some(Verb::MembersList) => Command::MembersList,
            Some(Verb::MessageAll) => Command::MessageAll { body: rest },
            Some(Verb::Message) => {
                let (recipient, body) = split_token(rest);
                Command::Message { recipient, body }
            }
            Some(Verb::Close) => Command::Close,
            None => Command::Unknown { verb },
        }
    }

    pub fn verb(&self) -> &'a str {
        match self {
            Command::MembersCount => Verb::MembersCount.as_str(),
            Command::MembersList => Verb::MembersList.as_str(),
            Command::MessageAll { .. } => Verb::MessageAll.as_str(),
            Command::Message { .. } => Verb::Message.as_str(),
            Command::Close => Verb::Close.as_str(),
            Command::Unknown { verb } => *verb,
        }
    }
}

fn split_token(s: &str) -> (&str, &str) {
    s.split_once(' ').unwrap_or((s, ""))
}

/// Lines the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<'a> {
    NamePrompt,
    Welcome { name: &'a str },
    NameTaken,
    MembersCount(usize),
    MembersList(Vec<&'a str>),
    Message { sender: &'a str, body: &'a str },
    InvalidReceiver,
    Disconnect,
    UnknownCommand,
}

/// Trait for writing complete server messages.
pub trait MessageWrite {
    /// Write the message, newline-terminated, to the buffer.
    fn write_message<B: BufMut>(&self, buf: &mut B);

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_message(&mut buf);
        buf.freeze()
    }
}

impl MessageWrite for Response<'_> {
    fn write_message<B: BufMut>(&self, buf: &mut B) {
        match self {
            Response::NamePrompt => put_line(buf, NAME_PROMPT),
            Response::Welcome { name } => put_line(
                buf,
                &format!(
                    "Hello, {name}! Commands: /members_count, /members_list, \
                     /message <nickname> <text>, /message_all <text>, /close"
                ),
            ),
            Response::NameTaken => put_line(buf, NAME_TAKEN),
            Response::MembersCount(n) => put_line(buf, &format!("Number of members on chat: {n}")),
            Response::MembersList(names) => {
                for name in names {
                    put_line(buf, name);
                }
            }
            Response::Message { sender, body } => {
                put_line(buf, &format!("Message from {sender} : {body}"))
            }
            Response::InvalidReceiver => put_line(buf, INVALID_RECEIVER),
            Response::Disconnect => put_line(buf, DISCONNECT_ACK),
            Response::UnknownCommand => put_line(buf, UNKNOWN_COMMAND),
        }
    }
}

fn put_line<B: BufMut>(buf: &mut B, line: &str) {
    buf.put_slice(line.as_bytes());
    buf.put_u8(b'\n');
}
