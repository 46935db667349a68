//! Reliable transfer primitives for stream sockets.
//!
//! [`send_all`] keeps writing until every byte of a buffer has been accepted
//! by the transport, and [`drain`] waits until the kernel has actually put
//! those bytes on the wire, so a caller can close the socket without cutting
//! off a peer that is still receiving. [`recv_exact`] collects an exact byte
//! count across as many reads as it takes.

mod drain;
mod recv;
mod send;

pub use drain::{OutboundQueue, drain};
pub use recv::{copy_to_end, recv_exact, recv_to_end};
pub use send::{Transfer, send_all};

use std::time::Duration;

/// Default number of bytes handed to the transport per write (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Maximum bytes requested from the transport per read.
pub const READ_CHUNK_SIZE: usize = 1000;

/// How often the outbound queue is polled while draining.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Errors produced by the transfer primitives.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the connection after {sent} bytes")]
    PeerClosed { sent: usize },

    #[error("incomplete transfer: expected {expected} bytes, received {received}")]
    Incomplete { expected: usize, received: usize },

    #[error("payload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("transfer timed out")]
    Timeout,
}
