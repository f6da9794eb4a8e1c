//! Per-Client Connection State
//!
//! A [`Connection`] owns the client's socket plus two buffers:
//!
//! - the **read buffer** accumulates bytes until a CRLF shows up;
//! - the **write buffer** holds the part of the reply the socket has not
//!   accepted yet.
//!
//! All I/O here is non-blocking. [`Connection::fill`] and
//! [`Connection::flush`] each perform exactly one `read`/`write` call and
//! report what happened; looping and re-arming is the caller's business.
//!
//! The stream type is generic so the buffering logic can be exercised
//! against in-memory streams in tests.

use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use mio::Token;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

use crate::protocol::{find_crlf, Reply};

/// Size of the scratch buffer used for each read.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Initial capacity of the read and write buffers
const INITIAL_BUFFER_SIZE: usize = 1024;

/// Result of a single non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadProgress {
    /// `n` bytes were appended to the read buffer.
    Data(usize),
    /// The socket has nothing more to give right now.
    WouldBlock,
    /// The peer closed its side of the connection.
    Eof,
}

/// Result of a single non-blocking write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Nothing was queued.
    Idle,
    /// The write buffer is now empty.
    Complete(usize),
    /// Some bytes (possibly zero) were accepted; the rest are still queued.
    Partial(usize),
}

/// Mutable state for one connected client.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    stream: S,
    token: Token,
    addr: SocketAddr,
    read_buf: BytesMut,
    write_buf: BytesMut,
    /// Set once a QUIT reply is queued; the connection closes after flushing it.
    close_after_flush: bool,
    /// Whether the reactor currently watches this socket for writability.
    write_armed: bool,
}

impl<S> Connection<S> {
    pub fn new(stream: S, token: Token, addr: SocketAddr) -> Self {
        Self {
            stream,
            token,
            addr,
            read_buf: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            close_after_flush: false,
            write_armed: false,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn buffered_input(&self) -> &[u8] {
        &self.read_buf
    }

    pub fn pending_output(&self) -> &[u8] {
        &self.write_buf
    }

    pub fn has_pending_output(&self) -> bool {
        !self.write_buf.is_empty()
    }

    pub fn is_closing(&self) -> bool {
        self.close_after_flush
    }

    pub fn write_armed(&self) -> bool {
        self.write_armed
    }

    pub(crate) fn set_write_armed(&mut self, armed: bool) {
        self.write_armed = armed;
    }

    /// Takes the buffered request if it contains a complete line.
    ///
    /// The whole read buffer is returned, not just the bytes up to the first
    /// CRLF, and the buffer is left empty.
    pub fn take_line(&mut self) -> Option<BytesMut> {
        find_crlf(&self.read_buf)?;
        Some(self.read_buf.split())
    }

    /// Drops everything buffered for reading.
    pub fn discard_input(&mut self) {
        self.read_buf.clear();
    }

    /// Tags the connection to close once the write buffer drains.
    pub fn close_when_flushed(&mut self) {
        self.close_after_flush = true;
    }

    /// Appends a reply to the write buffer.
    ///
    /// Anything still unsent stays in front of it. When `close_after` is set
    /// the connection is tagged to close once the buffer drains.
    pub fn queue_reply(&mut self, reply: &Reply, close_after: bool) {
        self.write_buf.reserve(reply.encoded_len());
        reply.serialize_into(&mut self.write_buf);
        if close_after {
            self.close_when_flushed();
        }
    }
}

impl<S: Read> Connection<S> {
    /// Performs one non-blocking read of up to `scratch.len()` bytes.
    ///
    /// `Interrupted` is retried; any other error is returned.
    pub fn fill(&mut self, scratch: &mut [u8]) -> io::Result<ReadProgress> {
        loop {
            match self.stream.read(scratch) {
                Ok(0) => return Ok(ReadProgress::Eof),
                Ok(n) => {
                    self.read_buf.extend_from_slice(&scratch[..n]);
                    return Ok(ReadProgress::Data(n));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReadProgress::WouldBlock)
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: Write> Connection<S> {
    /// Performs one non-blocking write of as much of the write buffer as
    /// the socket accepts.
    ///
    /// Accepted bytes are removed from the front of the buffer, so a retry
    /// resumes exactly where this attempt stopped.
    pub fn flush(&mut self) -> io::Result<WriteProgress> {
        if self.write_buf.is_empty() {
            return Ok(WriteProgress::Idle);
        }

        let written = loop {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break 0,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        self.write_buf.advance(written);
        if self.write_buf.is_empty() {
            Ok(WriteProgress::Complete(written))
        } else {
            Ok(WriteProgress::Partial(written))
        }
    }
}
