//! Command Handler Module
//!
//! This module maps a parsed [`Command`] onto the storage engine and
//! produces the [`Reply`] to send back.
//!
//! ## Dispatch Table
//!
//! | Command | Min args | Reply |
//! |---------|----------|-------|
//! | `PING`  | 0 | `+PONG` |
//! | `SET key value` | 2 | `+OK` |
//! | `GET key` | 1 | bulk value or `$-1` |
//! | `DEL key` | 1 | `+OK`, even when the key is absent |
//! | `QUIT`  | 0 | `+BYE` |
//!
//! Arguments beyond the minimum are ignored. Anything else gets
//! `-ERR unknown command`.
//!
//! Protocol errors never close the connection; the client can keep sending
//! commands after an error reply.

use crate::protocol::{Command, CommandKind, Reply};
use crate::storage::Storage;
use std::sync::Arc;

/// Handles commands by dispatching them to the storage engine.
///
/// Cheap to clone: clones share the same storage.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler").finish_non_exhaustive()
    }
}

impl CommandHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Executes a command and returns the reply.
    pub fn execute(&self, command: Command) -> Reply {
        let Command { kind, args } = command;

        match kind {
            CommandKind::Ping => Reply::pong(),
            CommandKind::Set => self.cmd_set(args),
            CommandKind::Get => self.cmd_get(&args),
            CommandKind::Del => self.cmd_del(&args),
            CommandKind::Quit => Reply::bye(),
            CommandKind::Unknown => Reply::error("ERR unknown command"),
        }
    }

    /// SET key value
    fn cmd_set(&self, args: Vec<bytes::Bytes>) -> Reply {
        let mut args = args.into_iter();
        let (Some(key), Some(value)) = (args.next(), args.next()) else {
            return wrong_arity(CommandKind::Set);
        };

        self.storage.set(key, value);
        Reply::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[bytes::Bytes]) -> Reply {
        let Some(key) = args.first() else {
            return wrong_arity(CommandKind::Get);
        };

        match self.storage.get(key) {
            Some(value) => Reply::bulk(value),
            None => Reply::Nil,
        }
    }

    /// DEL key
    fn cmd_del(&self, args: &[bytes::Bytes]) -> Reply {
        let Some(key) = args.first() else {
            return wrong_arity(CommandKind::Del);
        };

        self.storage.delete(key);
        Reply::ok()
    }
}

fn wrong_arity(kind: CommandKind) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        kind.name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_command;
    use crate::storage::StorageEngine;
    use bytes::Bytes;

    fn create_handler() -> (CommandHandler, Arc<StorageEngine>) {
        let storage = Arc::new(StorageEngine::new());
        (CommandHandler::new(storage.clone()), storage)
    }

    fn run(handler: &CommandHandler, line: &str) -> Reply {
        handler.execute(parse_command(line.as_bytes()))
    }

    #[test]
    fn test_ping() {
        let (handler, _) = create_handler();
        assert_eq!(run(&handler, "PING"), Reply::simple("PONG"));
        // Extra arguments are ignored
        assert_eq!(run(&handler, "PING hello"), Reply::simple("PONG"));
    }

    #[test]
    fn test_set_get() {
        let (handler, _) = create_handler();

        assert_eq!(run(&handler, "SET key value"), Reply::ok());
        assert_eq!(run(&handler, "GET key"), Reply::bulk(Bytes::from("value")));
        assert_eq!(run(&handler, "GET key").serialize(), b"$5\r\nvalue\r\n");
    }

    #[test]
    fn test_get_nonexistent() {
        let (handler, _) = create_handler();
        assert_eq!(run(&handler, "GET nonexistent").serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_del_then_get() {
        let (handler, _) = create_handler();

        run(&handler, "SET key value");
        assert_eq!(run(&handler, "DEL key"), Reply::ok());
        assert_eq!(run(&handler, "GET key"), Reply::Nil);
    }

    #[test]
    fn test_del_missing_key_is_ok() {
        let (handler, _) = create_handler();
        assert_eq!(run(&handler, "DEL missing").serialize(), b"+OK\r\n");
        assert_eq!(run(&handler, "DEL missing").serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_set_arity_does_not_mutate() {
        let (handler, storage) = create_handler();

        let reply = run(&handler, "SET onlykey");
        assert_eq!(
            reply,
            Reply::error("ERR wrong number of arguments for 'set' command")
        );
        assert!(storage.is_empty());
        assert_eq!(storage.stats().sets, 0);
    }

    #[test]
    fn test_get_and_del_arity() {
        let (handler, _) = create_handler();

        assert_eq!(
            run(&handler, "GET"),
            Reply::error("ERR wrong number of arguments for 'get' command")
        );
        assert_eq!(
            run(&handler, "DEL"),
            Reply::error("ERR wrong number of arguments for 'del' command")
        );
    }

    #[test]
    fn test_extra_set_arguments_ignored() {
        let (handler, _) = create_handler();

        assert_eq!(run(&handler, "SET greeting hello world"), Reply::ok());
        assert_eq!(run(&handler, "GET greeting"), Reply::bulk("hello"));
    }

    #[test]
    fn test_quit() {
        let (handler, _) = create_handler();
        assert_eq!(run(&handler, "QUIT").serialize(), b"+BYE\r\n");
    }

    #[test]
    fn test_unknown_command() {
        let (handler, _) = create_handler();

        assert_eq!(run(&handler, "HELLO world"), Reply::error("ERR unknown command"));
        assert_eq!(run(&handler, ""), Reply::error("ERR unknown command"));
    }

    #[test]
    fn test_empty_value_reads_back_as_nil() {
        let (handler, storage) = create_handler();

        // "SET k  v" carries an empty value argument
        assert_eq!(run(&handler, "SET k  v"), Reply::ok());
        assert_eq!(storage.get(b"k"), Some(Bytes::new()));
        assert_eq!(run(&handler, "GET k"), Reply::Nil);
    }
}
