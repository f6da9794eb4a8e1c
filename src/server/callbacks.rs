//! Event Callbacks
//!
//! The reactor knows about sockets and readiness; it knows nothing about
//! commands. Everything protocol-specific lives behind [`EventCallbacks`],
//! which the reactor invokes for each connection event and which answers
//! with an [`Action`] telling the reactor what to do with the connection
//! next.
//!
//! Callbacks must not block: they run on the event-loop thread.

use std::io::{Read, Write};

use crate::connection::{Connection, ConnectionError};

/// What the reactor should do with a connection after a callback returns.
#[derive(Debug)]
pub enum Action {
    /// Keep watching for reads; no write is pending.
    Idle,
    /// Arm a one-shot write watch for this connection.
    ScheduleWrite,
    /// Close the connection and drop it from the registry.
    Close(ConnectionError),
}

/// Connection-level hooks invoked by the reactor.
pub trait EventCallbacks {
    /// A connection was accepted and registered for reads.
    fn on_accept<S>(&mut self, conn: &mut Connection<S>) -> Action;

    /// The connection's socket became readable.
    fn on_read<S: Read>(&mut self, conn: &mut Connection<S>) -> Action;

    /// The connection's socket became writable.
    fn on_write<S: Write>(&mut self, conn: &mut Connection<S>) -> Action;

    /// The connection is about to be dropped.
    fn on_close<S>(&mut self, conn: &Connection<S>, reason: &ConnectionError) {
        let _ = (conn, reason);
    }
}
