//! Two-channel file server.
//!
//! Accepts control connections, reads one request from each, connects back
//! to the client's data port and serves either a listing of the root
//! directory or the contents of one file. Every control connection runs in
//! its own task; a failure in one never reaches the acceptor or any other
//! connection.

mod config;
mod dispatcher;
mod listing;
mod paths;
mod request_reader;
mod server;

pub use config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TRANSFER_TIMEOUT,
    DispatcherConfig, ServerConfig,
};
pub use dispatcher::{Dispatcher, Outcome};
pub use listing::list_root;
pub use paths::resolve_in_root;
pub use request_reader::read_request;
pub use server::FileServer;

/// Errors produced by the file server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ftserve_protocol::ProtocolError),

    #[error(transparent)]
    Rendezvous(#[from] ftserve_data_channel::RendezvousError),

    #[error(transparent)]
    Transfer(#[from] ftserve_transfer::TransferError),

    #[error("no request received before the deadline")]
    RequestTimeout,

    #[error("server already running")]
    AlreadyRunning,
}
