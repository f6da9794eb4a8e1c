//! # pollkv - A Single-Threaded Event-Driven Key-Value Server
//!
//! pollkv serves a small in-memory key-value store over TCP. Clients send
//! space-delimited text commands terminated by CRLF and receive RESP-style
//! replies. One thread multiplexes the listener and every client socket
//! over the OS readiness queue (epoll or kqueue, through `mio`).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              pollkv                                     │
//! │                                                                         │
//! │  ┌─────────────────────────── Reactor (one thread) ──────────────────┐  │
//! │  │                                                                   │  │
//! │  │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────────┐    │  │
//! │  │  │  Listener   │──>│   Poller    │──>│  ConnectionRegistry  │    │  │
//! │  │  │   (mio)     │   │ epoll/kqueue│   │   Token -> Connection│    │  │
//! │  │  └─────────────┘   └─────────────┘   └──────────┬───────────┘    │  │
//! │  │                                                  │ on_read/write  │  │
//! │  │                                                  ▼                │  │
//! │  │                                       ┌──────────────────────┐   │  │
//! │  │                                       │  ConnectionHandler   │   │  │
//! │  │                                       │  parse -> dispatch   │   │  │
//! │  │                                       └──────────┬───────────┘   │  │
//! │  └──────────────────────────────────────────────────┼───────────────┘  │
//! │                                                     ▼                  │
//! │                                   ┌──────────────────────────────────┐ │
//! │                                   │  StorageEngine (sharded RwLock)  │ │
//! │                                   └──────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use pollkv::commands::CommandHandler;
//! use pollkv::connection::{ConnectionHandler, ConnectionStats};
//! use pollkv::server::Reactor;
//! use pollkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = ConnectionHandler::new(CommandHandler::new(storage), stats);
//!
//! let reactor = Reactor::start("127.0.0.1", 6379, handler)?;
//! reactor.run()?;
//! # Ok::<(), pollkv::server::ServerError>(())
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `SET key value`
//! - `GET key`
//! - `DEL key`
//! - `QUIT`
//!
//! ## Module Overview
//!
//! - [`protocol`]: request parsing and reply encoding
//! - [`commands`]: command dispatch and arity rules
//! - [`storage`]: thread-safe storage engine
//! - [`connection`]: per-client state, registry and event callbacks
//! - [`server`]: the reactor and its readiness seam
//! - [`config`]: command-line configuration
//!
//! ## Limitations
//!
//! - Arguments cannot contain spaces; there is no quoting.
//! - Requests are not pipelined: send one command and wait for its reply.
//! - There are no timeouts. A client that never finishes a line keeps its
//!   slot until it disconnects.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{ConnectionHandler, ConnectionStats};
pub use protocol::{parse_command, Command, CommandKind, Reply};
pub use server::{Reactor, ServerError, ShutdownHandle};
pub use storage::{Storage, StorageEngine};

/// The default port pollkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host pollkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of pollkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
