//! Client side of the data channel.
//!
//! Binds the data port before the request is sent, then accepts exactly one
//! connection from the server.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RendezvousError;
use crate::rendezvous::{DataChannel, PeerIdentity};

/// Listener for the single data connection of one request.
pub struct DataListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl DataListener {
    /// Binds the data listener. Port 0 picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, RendezvousError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "data listener bound");
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Port to announce in the request.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts the server's data connection.
    ///
    /// With `expected_peer` set, connections from any other IP are dropped
    /// and the wait continues. The listener is consumed: one connection per
    /// request.
    pub async fn accept(
        self,
        expected_peer: Option<IpAddr>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DataChannel, RendezvousError> {
        let deadline = Instant::now() + timeout;
        let expected_peer = expected_peer.map(|ip| ip.to_canonical());

        loop {
            let (stream, addr) = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RendezvousError::Cancelled);
                }
                result = tokio::time::timeout_at(deadline, self.listener.accept()) => {
                    match result {
                        Ok(Ok(accepted)) => accepted,
                        Ok(Err(e)) => return Err(e.into()),
                        Err(_) => return Err(RendezvousError::Timeout(self.local_addr)),
                    }
                }
            };

            let peer = PeerIdentity::from_peer_addr(addr);
            if expected_peer.is_some_and(|ip| ip != peer.ip()) {
                warn!(%addr, "dropping data connection from unexpected peer");
                continue;
            }

            info!(%addr, "data connection accepted");
            return Ok(DataChannel::new(stream, addr));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;
    use crate::DATA_ACCEPT_TIMEOUT;

    fn loopback() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = DataListener::bind(loopback()).await.unwrap();
        assert!(listener.port() > 0);
    }

    #[tokio::test]
    async fn accepts_one_connection() {
        let listener = DataListener::bind(loopback()).await.unwrap();
        let addr = listener.local_addr();

        let sender = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"file bytes").await.unwrap();
        });

        let cancel = CancellationToken::new();
        let channel = listener
            .accept(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)), DATA_ACCEPT_TIMEOUT, &cancel)
            .await
            .unwrap();
        sender.await.unwrap();

        let mut stream = channel.into_inner();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"file bytes");
    }

    #[tokio::test]
    async fn ignores_unexpected_peer() {
        let listener = DataListener::bind(loopback()).await.unwrap();
        let addr = listener.local_addr();
        let intruder = tokio::spawn(async move { TcpStream::connect(addr).await });

        let cancel = CancellationToken::new();
        let err = listener
            .accept(
                Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
                Duration::from_millis(200),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::Timeout(_)));
        let _ = intruder.await;
    }

    #[tokio::test]
    async fn times_out_without_connection() {
        let listener = DataListener::bind(loopback()).await.unwrap();
        let cancel = CancellationToken::new();
        let err = listener
            .accept(None, Duration::from_millis(50), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancelled_accept() {
        let listener = DataListener::bind(loopback()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = listener
            .accept(None, DATA_ACCEPT_TIMEOUT, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::Cancelled));
    }
}
