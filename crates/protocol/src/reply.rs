//! Control-channel replies (server -> client).
//!
//! Replies are bare text with no framing or escaping:
//!
//! ```text
//! CONTINUE            request accepted, data connection follows
//! SENDING             file found, bytes follow on the data channel
//! ERROR: <detail>     terminal; the server closes the control channel
//! ```
//!
//! Error detail may echo a client-supplied filename verbatim, so a filename
//! containing reply literals shows up unescaped inside the error text.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::{
    MALFORMED_ERROR, REPLY_CONTINUE, REPLY_ERROR_PREFIX, REPLY_PREFIX_LEN, REPLY_SENDING,
    USAGE_ERROR,
};
use crate::error::ProtocolError;

/// Upper bound on the error text accepted by [`read_reply`].
const MAX_ERROR_REPLY_LEN: u64 = 4096;

/// A control-channel reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Continue,
    Sending,
    /// Full error text, including the `ERROR: ` prefix.
    Error(String),
}

impl Reply {
    /// The usage error sent for unrecognized commands.
    pub fn usage() -> Self {
        Reply::Error(USAGE_ERROR.to_string())
    }

    /// The error sent when a request cannot be decoded.
    pub fn malformed() -> Self {
        Reply::Error(MALFORMED_ERROR.to_string())
    }

    /// The error sent when a requested file cannot be opened.
    pub fn not_found(filename: &str) -> Self {
        Reply::Error(format!("{REPLY_ERROR_PREFIX}{filename} not found."))
    }

    /// Encodes the reply as it appears on the wire.
    pub fn encode(&self) -> &[u8] {
        match self {
            Reply::Continue => REPLY_CONTINUE.as_bytes(),
            Reply::Sending => REPLY_SENDING.as_bytes(),
            Reply::Error(text) => text.as_bytes(),
        }
    }

    /// Error detail without the `ERROR: ` prefix and trailing newline.
    pub fn error_detail(&self) -> Option<&str> {
        match self {
            Reply::Error(text) => Some(
                text.strip_prefix(REPLY_ERROR_PREFIX)
                    .unwrap_or(text)
                    .trim_end_matches('\n'),
            ),
            _ => None,
        }
    }
}

/// Reads one reply from the control channel.
///
/// Reads exactly the bytes of `CONTINUE` or `SENDING`, so a reply that
/// arrives in the same segment as the next one is not consumed. Error
/// replies are terminal and are read until the server closes the channel.
pub async fn read_reply<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Reply, ProtocolError> {
    let mut head = [0u8; REPLY_PREFIX_LEN];
    reader.read_exact(&mut head).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            ProtocolError::MalformedReply("control channel closed before a reply".into())
        }
        _ => e.into(),
    })?;

    let expect_rest = |word: &'static str| &word.as_bytes()[REPLY_PREFIX_LEN..];

    if head == REPLY_CONTINUE.as_bytes()[..REPLY_PREFIX_LEN] {
        read_tail(reader, expect_rest(REPLY_CONTINUE)).await?;
        Ok(Reply::Continue)
    } else if head == REPLY_SENDING.as_bytes()[..REPLY_PREFIX_LEN] {
        read_tail(reader, expect_rest(REPLY_SENDING)).await?;
        Ok(Reply::Sending)
    } else if head == REPLY_ERROR_PREFIX.as_bytes()[..REPLY_PREFIX_LEN] {
        let mut text = head.to_vec();
        reader
            .take(MAX_ERROR_REPLY_LEN)
            .read_to_end(&mut text)
            .await?;
        Ok(Reply::Error(String::from_utf8_lossy(&text).into_owned()))
    } else {
        Err(ProtocolError::MalformedReply(format!(
            "unexpected reply prefix {:?}",
            String::from_utf8_lossy(&head)
        )))
    }
}

async fn read_tail<R: AsyncRead + Unpin>(
    reader: &mut R,
    expected: &[u8],
) -> Result<(), ProtocolError> {
    let mut tail = vec![0u8; expected.len()];
    reader.read_exact(&mut tail).await?;
    if tail != expected {
        return Err(ProtocolError::MalformedReply(format!(
            "unexpected reply tail {:?}",
            String::from_utf8_lossy(&tail)
        )));
    }
    Ok(())
}
