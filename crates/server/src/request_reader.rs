use std::time::Duration;

use ftserve_protocol::constants::MAX_REQUEST_LEN;
use ftserve_protocol::{FrameStatus, frame_status};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::debug;

use crate::ServerError;

/// Reads the raw request payload from a control connection.
///
/// Stops when the payload is complete, the peer closes, or
/// [`MAX_REQUEST_LEN`] bytes have arrived. If the deadline passes with some
/// bytes buffered, those bytes are returned for decoding; with none, the
/// call fails with [`ServerError::RequestTimeout`].
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Vec<u8>, ServerError> {
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::with_capacity(128);
    let mut chunk = [0u8; MAX_REQUEST_LEN];

    while buf.len() < MAX_REQUEST_LEN {
        let room = MAX_REQUEST_LEN - buf.len();
        match tokio::time::timeout_at(deadline, reader.read(&mut chunk[..room])).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                buf.extend_from_slice(&chunk[..n]);
                if frame_status(&buf) == FrameStatus::Complete {
                    break;
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) if buf.is_empty() => return Err(ServerError::RequestTimeout),
            Err(_) => {
                debug!(len = buf.len(), "request deadline passed, decoding what arrived");
                break;
            }
        }
    }

    Ok(buf)
}
