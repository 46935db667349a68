use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::drain::{OutboundQueue, drain};
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Writes all of `buf` using the default chunk size and no deadline.
///
/// Returns once every byte was accepted and the writer flushed.
pub async fn send_all<W: AsyncWrite + Unpin>(
    writer: &mut W,
    buf: &[u8],
) -> Result<usize, TransferError> {
    Transfer::default().send_all(writer, buf).await
}

/// Transfer settings: how much to hand the transport per write and how long
/// a single step may stall before the transfer is abandoned.
#[derive(Debug, Clone, Copy)]
pub struct Transfer {
    chunk_size: usize,
    idle_timeout: Option<Duration>,
}

impl Default for Transfer {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            idle_timeout: None,
        }
    }
}

impl Transfer {
    /// Creates transfer settings. A `chunk_size` of 0 selects
    /// [`DEFAULT_CHUNK_SIZE`].
    pub fn new(chunk_size: usize, idle_timeout: Option<Duration>) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            chunk_size,
            idle_timeout,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Writes all of `buf`, looping past partial writes.
    ///
    /// A write that accepts zero bytes means the peer is gone and fails with
    /// [`TransferError::PeerClosed`]. Transport errors are returned as-is and
    /// never retried.
    pub async fn send_all<W: AsyncWrite + Unpin>(
        &self,
        writer: &mut W,
        buf: &[u8],
    ) -> Result<usize, TransferError> {
        let mut sent = 0;
        while sent < buf.len() {
            let end = (sent + self.chunk_size).min(buf.len());
            let n = self.step(writer.write(&buf[sent..end])).await?;
            if n == 0 {
                return Err(TransferError::PeerClosed { sent });
            }
            sent += n;
            trace!(sent, total = buf.len(), "partial write");
        }
        self.step(writer.flush()).await?;
        Ok(sent)
    }

    /// Writes all of `buf` and then waits for the socket's outbound queue to
    /// empty.
    pub async fn send_all_drained<S>(
        &self,
        stream: &mut S,
        buf: &[u8],
    ) -> Result<usize, TransferError>
    where
        S: AsyncWrite + OutboundQueue + Unpin + Sync,
    {
        let sent = self.send_all(stream, buf).await?;
        drain(&*stream, self.idle_timeout).await?;
        Ok(sent)
    }

    async fn step<T>(
        &self,
        fut: impl Future<Output = std::io::Result<T>>,
    ) -> Result<T, TransferError> {
        match self.idle_timeout {
            Some(timeout) => Ok(tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| TransferError::Timeout)??),
            None => Ok(fut.await?),
        }
    }
}
