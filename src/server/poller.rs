//! Readiness Notification Seam
//!
//! [`Poller`] is the only place that talks to `mio`'s readiness API
//! directly. The reactor registers sources, arms and disarms write
//! watches, and collects [`Readiness`] records; it never sees `mio::Events`.
//!
//! `mio` reports readiness edge-triggered. A write watch is emulated as
//! one-shot by re-registering the source with `WRITABLE` added (which
//! re-arms the edge) and dropping `WRITABLE` again once the write buffer
//! has drained.

use mio::event::Source;
use mio::{Events, Interest, Poll, Token, Waker};
use std::io;
use std::time::Duration;

/// One readiness report for a registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
    pub read_closed: bool,
}

impl From<&mio::event::Event> for Readiness {
    fn from(event: &mio::event::Event) -> Self {
        Self {
            token: event.token(),
            readable: event.is_readable(),
            writable: event.is_writable(),
            error: event.is_error(),
            read_closed: event.is_read_closed(),
        }
    }
}

/// Direction of interest for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    ReadWrite,
}

impl From<Direction> for Interest {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Read => Interest::READABLE,
            Direction::ReadWrite => Interest::READABLE | Interest::WRITABLE,
        }
    }
}

/// Owner of the OS readiness queue.
#[derive(Debug)]
pub struct Poller {
    poll: Poll,
    events: Events,
}

impl Poller {
    /// Creates the OS readiness queue with room for `capacity` events per wait.
    pub fn new(capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(capacity),
        })
    }

    pub fn register<S: Source + ?Sized>(
        &self,
        source: &mut S,
        token: Token,
        direction: Direction,
    ) -> io::Result<()> {
        self.poll
            .registry()
            .register(source, token, direction.into())
    }

    /// Arms a write watch. Calling it again before the watch fires is harmless.
    pub fn arm_write<S: Source + ?Sized>(&self, source: &mut S, token: Token) -> io::Result<()> {
        self.poll
            .registry()
            .reregister(source, token, Direction::ReadWrite.into())
    }

    /// Retires a write watch, leaving the read watch in place.
    pub fn disarm_write<S: Source + ?Sized>(
        &self,
        source: &mut S,
        token: Token,
    ) -> io::Result<()> {
        self.poll
            .registry()
            .reregister(source, token, Direction::Read.into())
    }

    pub fn deregister<S: Source + ?Sized>(&self, source: &mut S) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Creates a waker that interrupts [`wait`](Self::wait) from another thread.
    pub fn waker(&self, token: Token) -> io::Result<Waker> {
        Waker::new(self.poll.registry(), token)
    }

    /// Blocks until at least one event is ready (or `timeout` elapses) and
    /// appends the reports to `out`.
    ///
    /// `Interrupted` surfaces as an error; callers decide whether to retry.
    pub fn wait(&mut self, out: &mut Vec<Readiness>, timeout: Option<Duration>) -> io::Result<()> {
        self.poll.poll(&mut self.events, timeout)?;
        out.extend(self.events.iter().map(Readiness::from));
        Ok(())
    }
}
