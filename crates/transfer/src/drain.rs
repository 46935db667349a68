use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::time::Instant;
use tracing::debug;

use crate::{DRAIN_POLL_INTERVAL, TransferError};

/// A socket whose kernel send queue can be inspected.
pub trait OutboundQueue {
    /// Bytes written to the socket that the kernel has not yet sent.
    fn queued_bytes(&self) -> std::io::Result<usize>;
}

impl OutboundQueue for TcpStream {
    fn queued_bytes(&self) -> std::io::Result<usize> {
        sys::queued_bytes(self)
    }
}

impl OutboundQueue for OwnedWriteHalf {
    fn queued_bytes(&self) -> std::io::Result<usize> {
        sys::queued_bytes(self.as_ref())
    }
}

/// Waits until `stream` has no unsent bytes left in its kernel queue.
///
/// `idle_timeout` bounds how long the queue may stay without shrinking;
/// `None` waits indefinitely.
pub async fn drain<S: OutboundQueue + ?Sized>(
    stream: &S,
    idle_timeout: Option<Duration>,
) -> Result<(), TransferError> {
    let mut lowest = usize::MAX;
    let mut progressed_at = Instant::now();

    loop {
        let queued = stream.queued_bytes()?;
        if queued == 0 {
            return Ok(());
        }
        if queued < lowest {
            lowest = queued;
            progressed_at = Instant::now();
        } else if idle_timeout.is_some_and(|limit| progressed_at.elapsed() >= limit) {
            debug!(queued, "outbound queue stopped draining");
            return Err(TransferError::Timeout);
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use std::os::fd::AsRawFd;

    use tokio::net::TcpStream;

    pub(super) fn queued_bytes(stream: &TcpStream) -> std::io::Result<usize> {
        let mut queued: libc::c_int = 0;
        // SAFETY: the descriptor belongs to a live socket borrowed for the
        // duration of the call, and TIOCOUTQ writes a single c_int.
        let rc = unsafe {
            libc::ioctl(
                stream.as_raw_fd(),
                libc::TIOCOUTQ,
                &mut queued as *mut libc::c_int,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(queued.max(0) as usize)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use tokio::net::TcpStream;

    /// No portable way to inspect the send queue; a flushed stream is
    /// treated as drained.
    pub(super) fn queued_bytes(_stream: &TcpStream) -> std::io::Result<usize> {
        Ok(0)
    }
}
