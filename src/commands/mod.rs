//! Command Dispatch
//!
//! Turns a parsed [`Command`](crate::protocol::Command) into a storage call
//! and the [`Reply`](crate::protocol::Reply) for it:
//!
//! ```text
//! parse_command ──> CommandHandler::execute ──> dyn Storage
//!                          │
//!                          └──> Reply (queued on the connection)
//! ```
//!
//! Dispatch is synchronous and never touches the socket.

pub mod handler;

pub use handler::CommandHandler;
