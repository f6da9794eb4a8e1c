use std::io;
use thiserror::Error;

/// Result type alias for reactor setup and loop operations
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Errors that stop the server. Per-connection failures never surface here.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The host/port pair did not resolve to any socket address
    #[error("could not resolve listen address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Creating or binding the listening socket failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Creating or waiting on the readiness queue failed
    #[error("poll error: {0}")]
    Poll(#[source] io::Error),

    /// Any other I/O failure during setup
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
