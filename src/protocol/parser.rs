//! Inline Command Parser
//!
//! Requests on this wire are single text lines:
//!
//! ```text
//! <COMMAND> [arg1] [arg2] ...\r\n
//! ```
//!
//! The command token is matched case-insensitively. Arguments are split on
//! single spaces with no quoting and no escaping, so a value containing a
//! space arrives as two arguments. That is a property of the protocol and is
//! kept as-is for wire compatibility.
//!
//! Parsing never fails: anything that is not a known command token becomes
//! [`CommandKind::Unknown`], and the dispatcher answers it with an error reply.
//!
//! The parser is also not pipelining-safe. The caller hands it the whole
//! accumulated line buffer once a CRLF has been seen, and everything in that
//! buffer is treated as one command.

use crate::protocol::types::{Reply, CRLF};
use bytes::Bytes;
use std::fmt;

/// The command selected by the first token of a request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    Set,
    Get,
    Del,
    Quit,
    Unknown,
}

impl CommandKind {
    /// Matches a command token, ignoring ASCII case.
    pub fn from_token(token: &[u8]) -> Self {
        const TABLE: [(&[u8], CommandKind); 5] = [
            (b"PING", CommandKind::Ping),
            (b"SET", CommandKind::Set),
            (b"GET", CommandKind::Get),
            (b"DEL", CommandKind::Del),
            (b"QUIT", CommandKind::Quit),
        ];

        TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, kind)| *kind)
            .unwrap_or(CommandKind::Unknown)
    }

    /// Lowercase name used in arity error messages.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::Set => "set",
            CommandKind::Get => "get",
            CommandKind::Del => "del",
            CommandKind::Quit => "quit",
            CommandKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed request line. Built per line and consumed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    /// Arguments after the command token, in order.
    pub args: Vec<Bytes>,
}

impl Command {
    pub fn new(kind: CommandKind, args: Vec<Bytes>) -> Self {
        Self { kind, args }
    }
}

/// Parses a raw request buffer into a [`Command`].
///
/// Leading and trailing ASCII whitespace (including the CRLF) is trimmed,
/// then the remainder is split on every single space. Consecutive spaces
/// therefore produce empty arguments.
///
/// # Example
///
/// ```
/// use pollkv::protocol::{parse_command, CommandKind};
///
/// let cmd = parse_command(b"set name Ariz\r\n");
/// assert_eq!(cmd.kind, CommandKind::Set);
/// assert_eq!(cmd.args, vec!["name", "Ariz"]);
/// ```
pub fn parse_command(buf: &[u8]) -> Command {
    let line = buf.trim_ascii();
    if line.is_empty() {
        return Command::new(CommandKind::Unknown, Vec::new());
    }

    let mut parts = line.split(|&b| b == b' ');
    let kind = parts
        .next()
        .map(CommandKind::from_token)
        .unwrap_or(CommandKind::Unknown);
    let args = parts.map(Bytes::copy_from_slice).collect();

    Command::new(kind, args)
}

/// Finds the position of the first CRLF in the buffer.
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}

/// Encodes a value as a bulk reply; an empty value encodes as nil.
pub fn format_bulk(value: &[u8]) -> Vec<u8> {
    Reply::bulk(Bytes::copy_from_slice(value)).serialize()
}

/// Encodes a simple string reply.
pub fn format_simple(text: &str) -> Vec<u8> {
    Reply::simple(text).serialize()
}

/// Encodes an error reply.
pub fn format_error(text: &str) -> Vec<u8> {
    Reply::error(text).serialize()
}
