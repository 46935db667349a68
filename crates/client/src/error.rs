use std::path::PathBuf;

/// Errors produced by [`FileClient`](crate::FileClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ftserve_protocol::ProtocolError),

    #[error(transparent)]
    Transfer(#[from] ftserve_transfer::TransferError),

    #[error(transparent)]
    Rendezvous(#[from] ftserve_data_channel::RendezvousError),

    /// The server answered with an error reply; holds its text.
    #[error("server error: {0}")]
    Server(String),

    #[error("{} already exists", .0.display())]
    FileExists(PathBuf),
}
