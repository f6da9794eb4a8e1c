//! Connection Registry
//!
//! The reactor's table of live connections, keyed by poll [`Token`].
//!
//! Only the event-loop thread touches it, so there is no locking. Tokens
//! are handed out from a monotonically increasing counter and never reused,
//! which keeps a late event for a closed connection from being routed to a
//! newer one.

use mio::Token;
use std::collections::HashMap;

use super::state::Connection;

/// Owned mapping from token to connection.
#[derive(Debug)]
pub struct ConnectionRegistry<S = mio::net::TcpStream> {
    connections: HashMap<Token, Connection<S>>,
    next_token: usize,
}

impl<S> ConnectionRegistry<S> {
    /// Creates an empty registry whose first token is `first_token`.
    ///
    /// Tokens below it are left to the caller (listener, waker).
    pub fn new(first_token: usize) -> Self {
        Self {
            connections: HashMap::new(),
            next_token: first_token,
        }
    }

    /// Reserves the token for the next connection.
    pub fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    /// Adds a connection under its own token.
    pub fn insert(&mut self, conn: Connection<S>) {
        self.connections.insert(conn.token(), conn);
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection<S>> {
        self.connections.get_mut(&token)
    }

    pub fn remove(&mut self, token: Token) -> Option<Connection<S>> {
        self.connections.remove(&token)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Removes and returns every connection.
    pub fn drain(&mut self) -> impl Iterator<Item = Connection<S>> + '_ {
        self.connections.drain().map(|(_, conn)| conn)
    }
}
