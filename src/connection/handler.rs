//! Connection Callbacks
//!
//! [`ConnectionHandler`] is the command-handling side of the reactor. It
//! implements [`EventCallbacks`]: the reactor tells it a socket is readable
//! or writable, and it moves bytes, runs commands and says what should
//! happen next.
//!
//! ## Lifecycle
//!
//! ```text
//! 1. Listener readable -> accept -> on_accept
//!        │
//!        ▼
//! 2. ┌──────────────────────────────────────┐
//!    │  on_read                             │
//!    │   read 1 KB chunks until WouldBlock  │
//!    │   no CRLF yet?  -> wait for more     │
//!    │   CRLF seen     -> parse, execute,   │
//!    │                    queue reply,      │
//!    │                    schedule write    │
//!    └──────────────────┬───────────────────┘
//!                       ▼
//!    ┌──────────────────────────────────────┐
//!    │  on_write                            │
//!    │   partial -> keep suffix, re-arm     │
//!    │   done    -> disarm (or close: QUIT) │
//!    └──────────────────────────────────────┘
//!        │
//!        ▼
//! 3. EOF / I/O error / QUIT flushed / shutdown -> on_close
//!    (a request that arrived with the EOF is answered first)
//! ```
//!
//! ## Known protocol limitation
//!
//! Once a CRLF is present, the entire read buffer is parsed as a single
//! command. Two requests arriving in the same read are not split apart, so
//! clients must wait for each reply before sending the next command.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::state::{Connection, ReadProgress, WriteProgress, READ_CHUNK_SIZE};
use crate::commands::CommandHandler;
use crate::protocol::{parse_command, CommandKind};
use crate::server::{Action, EventCallbacks};
use crate::storage::StorageEngine;

/// Counters shared between the reactor thread and whoever reports on it.
///
/// All updates are relaxed; readers get a best-effort view.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Accepted since startup
    pub connections_accepted: AtomicU64,
    /// Accepted and not yet closed
    pub active_connections: AtomicU64,
    /// Requests that produced a reply
    pub commands_processed: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        Self::add(&self.connections_accepted, 1);
        Self::add(&self.active_connections, 1);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        Self::add(&self.commands_processed, 1);
    }

    pub fn bytes_read(&self, count: usize) {
        Self::add(&self.bytes_read, count as u64);
    }

    pub fn bytes_written(&self, count: usize) {
        Self::add(&self.bytes_written, count as u64);
    }
}

/// Why a connection was closed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Read or write on the socket failed
    #[error("socket I/O failed: {0}")]
    IoError(#[from] std::io::Error),

    /// Peer closed its end of the socket
    #[error("peer closed the connection")]
    ClientDisconnected,

    /// QUIT reply was fully delivered
    #[error("client sent QUIT")]
    Quit,

    /// The readiness queue flagged the socket as failed
    #[error("poller reported a socket error")]
    EventError,

    #[error("server shutting down")]
    Shutdown,
}

/// The callbacks the server runs for every client: buffer input, execute
/// complete requests, flush replies.
pub struct ConnectionHandler {
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
    /// Reused for every socket read
    scratch: Box<[u8]>,
}

impl ConnectionHandler {
    pub fn new(commands: CommandHandler, stats: Arc<ConnectionStats>) -> Self {
        Self {
            commands,
            stats,
            scratch: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// A handler over a fresh [`StorageEngine`] with its own stats.
    pub fn in_memory() -> Self {
        Self::new(
            CommandHandler::new(Arc::new(StorageEngine::new())),
            Arc::new(ConnectionStats::new()),
        )
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.stats
    }
}

impl EventCallbacks for ConnectionHandler {
    fn on_accept<S>(&mut self, conn: &mut Connection<S>) -> Action {
        self.stats.connection_opened();
        info!(client = %conn.addr(), token = ?conn.token(), "Client connected");
        Action::Idle
    }

    fn on_read<S: Read>(&mut self, conn: &mut Connection<S>) -> Action {
        let mut peer_closed = false;
        loop {
            match conn.fill(&mut self.scratch) {
                Ok(ReadProgress::Data(n)) => {
                    self.stats.bytes_read(n);
                    trace!(client = %conn.addr(), bytes = n, "Read data");
                }
                Ok(ReadProgress::WouldBlock) => break,
                Ok(ReadProgress::Eof) => {
                    peer_closed = true;
                    break;
                }
                Err(e) => return Action::Close(ConnectionError::IoError(e)),
            }
        }

        // A pending QUIT reply still gets flushed; the write side closes.
        if conn.is_closing() {
            conn.discard_input();
            return Action::Idle;
        }

        let Some(line) = conn.take_line() else {
            if peer_closed {
                if conn.has_pending_output() {
                    conn.close_when_flushed();
                    return Action::ScheduleWrite;
                }
                return Action::Close(ConnectionError::ClientDisconnected);
            }
            trace!(
                client = %conn.addr(),
                buffered = conn.buffered_input().len(),
                "Waiting for end of line"
            );
            return Action::Idle;
        };

        let command = parse_command(&line);
        let quit = command.kind == CommandKind::Quit;
        trace!(client = %conn.addr(), command = %command.kind, "Parsed command");

        let reply = self.commands.execute(command);
        self.stats.command_processed();
        if reply.is_error() {
            debug!(client = %conn.addr(), reply = %reply, "Command rejected");
        }

        // A request that arrived together with the peer's FIN is still
        // answered, then the connection closes once the reply is out.
        conn.queue_reply(&reply, quit || peer_closed);

        Action::ScheduleWrite
    }

    fn on_write<S: Write>(&mut self, conn: &mut Connection<S>) -> Action {
        match conn.flush() {
            Ok(WriteProgress::Idle) => Action::Idle,
            Ok(WriteProgress::Partial(n)) => {
                self.stats.bytes_written(n);
                trace!(
                    client = %conn.addr(),
                    bytes = n,
                    remaining = conn.pending_output().len(),
                    "Partial write"
                );
                Action::ScheduleWrite
            }
            Ok(WriteProgress::Complete(n)) => {
                self.stats.bytes_written(n);
                trace!(client = %conn.addr(), bytes = n, "Sent response");
                if conn.is_closing() {
                    Action::Close(ConnectionError::Quit)
                } else {
                    Action::Idle
                }
            }
            Err(e) => Action::Close(ConnectionError::IoError(e)),
        }
    }

    fn on_close<S>(&mut self, conn: &Connection<S>, reason: &ConnectionError) {
        self.stats.connection_closed();

        match reason {
            ConnectionError::ClientDisconnected | ConnectionError::Quit => {
                info!(client = %conn.addr(), "Client disconnected")
            }
            ConnectionError::IoError(io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %conn.addr(), "Connection reset by client")
            }
            ConnectionError::Shutdown => debug!(client = %conn.addr(), "Closed on shutdown"),
            _ => warn!(client = %conn.addr(), error = %reason, "Connection error"),
        }
    }
}
