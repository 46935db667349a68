//! Error types for the data channel.

use std::net::SocketAddr;

/// Errors produced while establishing a data channel.
#[derive(Debug, thiserror::Error)]
pub enum RendezvousError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data port {addr} unreachable: {source}")]
    Unreachable {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("data connection to {0} timed out")]
    Timeout(SocketAddr),

    #[error("invalid data port: {0}")]
    InvalidPort(u16),

    #[error("cancelled")]
    Cancelled,
}
