//! Wire Protocol Implementation
//!
//! Requests are space-delimited text lines terminated by CRLF. Replies use
//! RESP-style framing for simple strings, errors and bulk strings.
//!
//! ## Modules
//!
//! - `types`: Defines the `Reply` enum and serialization
//! - `parser`: Turns a buffered request line into a `Command`
//!
//! ## Example
//!
//! ```
//! use pollkv::protocol::{parse_command, CommandKind, Reply};
//!
//! let cmd = parse_command(b"GET name\r\n");
//! assert_eq!(cmd.kind, CommandKind::Get);
//!
//! let bytes = Reply::bulk("Ariz").serialize();
//! assert_eq!(bytes, b"$4\r\nAriz\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{
    find_crlf, format_bulk, format_error, format_simple, parse_command, Command, CommandKind,
};
pub use types::Reply;
