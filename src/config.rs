//! Command-line configuration for the server binary.

use clap::{ArgAction, Parser};

use crate::{DEFAULT_HOST, DEFAULT_PORT};

/// Server configuration
///
/// `-h` selects the host, so help is only available as `--help`.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "pollkv", version, about = "Single-threaded in-memory key-value server")]
#[command(disable_help_flag = true)]
pub struct Config {
    /// Host to bind to
    #[arg(short = 'h', long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "POLLKV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            help: None,
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
