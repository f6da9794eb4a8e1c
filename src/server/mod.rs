//! Event Loop Module
//!
//! The single-threaded, readiness-driven core of the server.
//!
//! - `reactor`: owns the listener, the readiness queue and the connection
//!   registry; runs the wait/dispatch loop
//! - `poller`: the thin seam over `mio` (epoll / kqueue)
//! - `callbacks`: the trait the reactor calls into for accept/read/write
//! - `error`: fatal server errors
//!
//! ## Example
//!
//! ```no_run
//! use pollkv::connection::ConnectionHandler;
//! use pollkv::server::Reactor;
//!
//! let reactor = Reactor::start("127.0.0.1", 6379, ConnectionHandler::in_memory())?;
//! let shutdown = reactor.shutdown_handle();
//!
//! let looper = std::thread::spawn(move || reactor.run());
//! // ... later, from any thread:
//! shutdown.shutdown()?;
//! looper.join().expect("reactor thread panicked")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod callbacks;
pub mod error;
pub mod poller;
pub mod reactor;

pub use callbacks::{Action, EventCallbacks};
pub use error::{ServerError, ServerResult};
pub use poller::{Direction, Poller, Readiness};
pub use reactor::{Reactor, ShutdownHandle, EVENTS_CAPACITY};
