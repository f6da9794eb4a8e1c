//! Connection Module
//!
//! This module holds everything the reactor keeps per client:
//!
//! - `state`: the [`Connection`] itself (socket, buffers, close tag)
//! - `registry`: the token → connection table owned by the reactor
//! - `handler`: [`ConnectionHandler`], the callbacks that turn readable
//!   bytes into replies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Reactor (server)                        │
//! │                                                             │
//! │   ConnectionRegistry: Token ──> Connection                  │
//! │                                     │                       │
//! │            readable / writable      │                       │
//! │                                     ▼                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │               ConnectionHandler                     │    │
//! │  │  ┌───────────┐   ┌───────────┐   ┌──────────────┐   │    │
//! │  │  │ Read line │──>│ Parse cmd │──>│ Execute cmd  │   │    │
//! │  │  └───────────┘   └───────────┘   └──────┬───────┘   │    │
//! │  │                                         ▼           │    │
//! │  │                                  ┌──────────────┐   │    │
//! │  │                                  │ Queue reply  │   │    │
//! │  │                                  └──────────────┘   │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;
pub mod registry;
pub mod state;

pub use handler::{ConnectionError, ConnectionHandler, ConnectionStats};
pub use registry::ConnectionRegistry;
pub use state::{Connection, ReadProgress, WriteProgress, READ_CHUNK_SIZE};
