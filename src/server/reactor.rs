//! Single-Threaded Reactor
//!
//! The reactor owns the listening socket, the readiness queue and the
//! registry of live connections, and runs the wait/dispatch loop:
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │        Poller::wait          │◄─────────────┐
//!            └──────────────┬───────────────┘              │
//!                           │ readiness records            │
//!          ┌────────────────┼──────────────────┐           │
//!          ▼                ▼                  ▼           │
//!     LISTENER            WAKER             client         │
//!   accept until      stop flag set?      registry hit?    │
//!   WouldBlock        -> leave loop       on_read/on_write │
//!          │                                   │           │
//!          └───────────────────────────────────┴───────────┘
//! ```
//!
//! Every callback runs on this thread and must return without blocking.
//! Nothing else touches the registry, so it needs no locking.
//!
//! Shutdown is requested from other threads through a [`ShutdownHandle`]:
//! it raises a flag and fires a waker, and the loop closes everything
//! itself once `wait` returns.

use mio::net::TcpListener;
use mio::{Token, Waker};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::callbacks::{Action, EventCallbacks};
use super::error::{ServerError, ServerResult};
use super::poller::{Direction, Poller, Readiness};
use crate::connection::{Connection, ConnectionError, ConnectionRegistry};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CLIENT_TOKEN: usize = 2;

/// Maximum readiness events collected per wait
pub const EVENTS_CAPACITY: usize = 64;

/// How long the loop waits before retrying an accept that failed for a
/// reason other than an empty backlog (for example `EMFILE`).
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// What to do after `accept` returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptStep {
    /// Try the next pending connection right away.
    Retry,
    /// The backlog is empty.
    Drained,
    /// Stop for now and retry on a later loop pass. The listener's readiness
    /// edge is already consumed, so no new event will announce the backlog.
    Backoff,
}

fn accept_step(err: &io::Error) -> AcceptStep {
    match err.kind() {
        io::ErrorKind::WouldBlock => AcceptStep::Drained,
        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted => AcceptStep::Retry,
        _ => AcceptStep::Backoff,
    }
}

/// Requests a running reactor to stop.
///
/// Cloneable and safe to use from any thread, including a signal task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    /// Asks the loop to exit. The loop observes it as soon as its current
    /// wait returns; all sockets are closed on the loop thread.
    pub fn shutdown(&self) -> io::Result<()> {
        self.requested.store(true, Ordering::SeqCst);
        self.waker.wake()
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// The event loop.
pub struct Reactor<C> {
    listener: TcpListener,
    poller: Poller,
    registry: ConnectionRegistry,
    callbacks: C,
    shutdown: ShutdownHandle,
    local_addr: SocketAddr,
    /// Set when the last accept attempt failed with connections possibly
    /// still queued on the listener.
    accept_backoff: bool,
}

impl<C> std::fmt::Debug for Reactor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("local_addr", &self.local_addr)
            .field("connections", &self.registry.len())
            .finish()
    }
}

impl<C: EventCallbacks> Reactor<C> {
    /// Binds `host:port` and registers the listener for readiness.
    ///
    /// The listener gets `SO_REUSEADDR` and non-blocking mode from
    /// `mio::net::TcpListener::bind`. Any failure here is fatal.
    pub fn start(host: &str, port: u16, callbacks: C) -> ServerResult<Self> {
        let addr_str = format!("{}:{}", host, port);

        let addr = resolve(host, port).map_err(|source| {
            error!(addr = %addr_str, error = %source, "Failed to resolve listen address");
            ServerError::Resolve {
                addr: addr_str.clone(),
                source,
            }
        })?;

        let mut listener = TcpListener::bind(addr).map_err(|source| {
            error!(addr = %addr_str, error = %source, "Failed to bind listener");
            ServerError::Bind {
                addr: addr_str.clone(),
                source,
            }
        })?;

        let poller = Poller::new(EVENTS_CAPACITY).map_err(|e| {
            error!(error = %e, "Failed to create readiness queue");
            ServerError::Poll(e)
        })?;
        poller
            .register(&mut listener, LISTENER, Direction::Read)
            .map_err(ServerError::Poll)?;
        let waker = poller.waker(WAKER).map_err(ServerError::Poll)?;

        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Listening");

        Ok(Self {
            listener,
            poller,
            registry: ConnectionRegistry::new(FIRST_CLIENT_TOKEN),
            callbacks,
            shutdown: ShutdownHandle {
                requested: Arc::new(AtomicBool::new(false)),
                waker: Arc::new(waker),
            },
            local_addr,
            accept_backoff: false,
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Runs the loop until shutdown is requested or the readiness queue fails.
    ///
    /// On the way out every connection is closed, then the listener, then
    /// the readiness queue.
    pub fn run(mut self) -> ServerResult<()> {
        let result = self.event_loop();

        self.close_all();
        let Self {
            listener, poller, ..
        } = self;
        drop(listener);
        drop(poller);
        info!("Reactor stopped");

        result
    }

    fn event_loop(&mut self) -> ServerResult<()> {
        let mut ready: Vec<Readiness> = Vec::with_capacity(EVENTS_CAPACITY);

        while !self.shutdown.is_requested() {
            self.turn(&mut ready)?;
        }
        Ok(())
    }

    /// One wait followed by dispatch of everything it reported.
    fn turn(&mut self, ready: &mut Vec<Readiness>) -> ServerResult<()> {
        let retry_accept = self.accept_backoff;
        let timeout = retry_accept.then_some(ACCEPT_RETRY_DELAY);

        ready.clear();
        match self.poller.wait(ready, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => {
                error!(error = %e, "Readiness wait failed");
                return Err(ServerError::Poll(e));
            }
        }

        if self.shutdown.is_requested() {
            return Ok(());
        }

        for readiness in ready.drain(..) {
            self.dispatch(readiness);
        }

        if retry_accept && self.accept_backoff {
            self.accept_pending();
        }
        Ok(())
    }

    fn dispatch(&mut self, readiness: Readiness) {
        match readiness.token {
            LISTENER => self.accept_pending(),
            WAKER => {}
            token => self.dispatch_client(token, readiness),
        }
    }

    /// Accepts until the listener reports `WouldBlock`.
    fn accept_pending(&mut self) {
        self.accept_backoff = false;

        loop {
            let (mut stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => match accept_step(&e) {
                    AcceptStep::Retry => continue,
                    AcceptStep::Drained => return,
                    AcceptStep::Backoff => {
                        warn!(error = %e, "Failed to accept connection, will retry");
                        self.accept_backoff = true;
                        return;
                    }
                },
            };

            let token = self.registry.next_token();
            if let Err(e) = self.poller.register(&mut stream, token, Direction::Read) {
                warn!(client = %addr, error = %e, "Failed to register connection");
                continue;
            }

            let mut conn = Connection::new(stream, token, addr);
            let action = self.callbacks.on_accept(&mut conn);
            self.registry.insert(conn);
            self.apply(token, action);
        }
    }

    fn dispatch_client(&mut self, token: Token, readiness: Readiness) {
        let Some(conn) = self.registry.get_mut(token) else {
            trace!(token = ?token, "Ignoring event for closed connection");
            return;
        };

        if readiness.error {
            debug!(client = %conn.addr(), "Socket error event");
            self.close(token, ConnectionError::EventError);
            return;
        }

        if readiness.readable || readiness.read_closed {
            let action = self.callbacks.on_read(conn);
            if !self.apply(token, action) {
                return;
            }
        }

        if readiness.writable {
            if let Some(conn) = self.registry.get_mut(token) {
                let action = self.callbacks.on_write(conn);
                self.apply(token, action);
            }
        }
    }

    /// Carries out a callback's decision. Returns `false` if the connection
    /// is gone afterwards.
    fn apply(&mut self, token: Token, action: Action) -> bool {
        match action {
            Action::Idle => {
                let Some(conn) = self.registry.get_mut(token) else {
                    return false;
                };
                if conn.write_armed() && !conn.has_pending_output() {
                    if let Err(e) = self.poller.disarm_write(conn.stream_mut(), token) {
                        self.close(token, ConnectionError::IoError(e));
                        return false;
                    }
                    conn.set_write_armed(false);
                }
                true
            }
            Action::ScheduleWrite => match self.schedule_write(token) {
                Ok(()) => true,
                Err(e) => {
                    self.close(token, ConnectionError::IoError(e));
                    false
                }
            },
            Action::Close(reason) => {
                self.close(token, reason);
                false
            }
        }
    }

    /// Arms a one-shot write watch for `token`.
    ///
    /// Re-arming an already armed watch is harmless; it re-triggers the
    /// edge so a partial write gets another chance.
    pub fn schedule_write(&mut self, token: Token) -> io::Result<()> {
        let Some(conn) = self.registry.get_mut(token) else {
            return Ok(());
        };
        self.poller.arm_write(conn.stream_mut(), token)?;
        conn.set_write_armed(true);
        Ok(())
    }

    fn close(&mut self, token: Token, reason: ConnectionError) {
        let Some(mut conn) = self.registry.remove(token) else {
            return;
        };

        self.callbacks.on_close(&conn, &reason);
        if let Err(e) = self.poller.deregister(conn.stream_mut()) {
            debug!(client = %conn.addr(), error = %e, "Failed to deregister connection");
        }
        // Dropping the connection closes the socket.
    }

    fn close_all(&mut self) {
        let count = self.registry.len();
        if count > 0 {
            info!(connections = count, "Closing client connections");
        }

        let connections: Vec<_> = self.registry.drain().collect();
        for mut conn in connections {
            self.callbacks.on_close(&conn, &ConnectionError::Shutdown);
            if let Err(e) = self.poller.deregister(conn.stream_mut()) {
                debug!(client = %conn.addr(), error = %e, "Failed to deregister connection");
            }
        }
        if let Err(e) = self.poller.deregister(&mut self.listener) {
            debug!(error = %e, "Failed to deregister listener");
        }
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "host resolved to no addresses",
        )
    })
}
