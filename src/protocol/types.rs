//! Reply Types
//!
//! This module defines the replies the server sends back to clients.
//! The reply encodings borrow their framing from RESP, but only four
//! shapes exist on this wire.
//!
//! ## Protocol Format
//!
//! Each reply starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `$` Bulk String (or nil bulk)
//!
//! All replies are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Nil Bulk String: `$-1\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used on the wire, for requests and replies alike
pub const CRLF: &[u8] = b"\r\n";

/// Reply type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const BULK_STRING: u8 = b'$';
}

/// A reply produced by the command dispatcher.
///
/// Replies are short-lived: they are serialized straight into the
/// connection's write buffer and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Length-prefixed value.
    /// Format: `$<length>\r\n<data>\r\n`
    Bulk(Bytes),

    /// Absent value.
    /// Format: `$-1\r\n`
    Nil,

    /// Status text. Cannot contain CRLF.
    /// Format: `+<string>\r\n`
    Simple(String),

    /// Error text.
    /// Format: `-<error message>\r\n`
    Error(String),
}

impl Reply {
    /// Creates a bulk reply.
    ///
    /// An empty value has no bulk encoding of its own on this wire and
    /// becomes [`Reply::Nil`].
    ///
    /// # Example
    /// ```
    /// use pollkv::protocol::Reply;
    /// assert_eq!(Reply::bulk("hello").serialize(), b"$5\r\nhello\r\n");
    /// assert_eq!(Reply::bulk(""), Reply::Nil);
    /// ```
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            Reply::Nil
        } else {
            Reply::Bulk(data)
        }
    }

    /// Creates a simple string reply.
    pub fn simple(s: impl Into<String>) -> Self {
        Reply::Simple(s.into())
    }

    /// Creates an error reply.
    ///
    /// # Example
    /// ```
    /// use pollkv::protocol::Reply;
    /// let err = Reply::error("ERR unknown command");
    /// assert!(err.is_error());
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    pub fn pong() -> Self {
        Reply::Simple("PONG".to_string())
    }

    pub fn bye() -> Self {
        Reply::Simple("BYE".to_string())
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    ///
    /// Connections use this to append straight into their pending write
    /// buffer without an intermediate allocation.
    pub fn serialize_into<B: bytes::BufMut>(&self, buf: &mut B) {
        match self {
            Reply::Simple(s) => {
                buf.put_u8(prefix::SIMPLE_STRING);
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.put_u8(prefix::ERROR);
                buf.put_slice(s.as_bytes());
                buf.put_slice(CRLF);
            }
            Reply::Bulk(data) => {
                buf.put_u8(prefix::BULK_STRING);
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(CRLF);
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            Reply::Nil => {
                buf.put_u8(prefix::BULK_STRING);
                buf.put_slice(b"-1");
                buf.put_slice(CRLF);
            }
        }
    }

    /// Number of bytes [`serialize`](Self::serialize) will produce.
    pub fn encoded_len(&self) -> usize {
        match self {
            Reply::Simple(s) | Reply::Error(s) => 1 + s.len() + 2,
            Reply::Bulk(data) => 1 + data.len().to_string().len() + 2 + data.len() + 2,
            Reply::Nil => 5,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Bulk(data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Reply::Nil => write!(f, "(nil)"),
        }
    }
}
