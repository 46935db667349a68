//! Error types for the control-channel codec.

/// Errors produced while decoding requests or replies.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
