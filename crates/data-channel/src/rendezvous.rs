//! Server side of the data channel.
//!
//! Derives the client's address from the live control connection and opens
//! the data connection back to it on the client-chosen port.

use std::fmt;
use std::net::{IpAddr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::DATA_CONNECT_TIMEOUT;
use crate::error::RendezvousError;

/// Network address of the client as seen on the control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    addr: SocketAddr,
}

impl PeerIdentity {
    /// Reads the peer address of an established control connection.
    pub fn from_control(control: &TcpStream) -> Result<Self, RendezvousError> {
        Ok(Self::from_peer_addr(control.peer_addr()?))
    }

    /// Wraps a peer address. IPv4-mapped IPv6 addresses (seen on dual-stack
    /// listeners) are unwrapped to plain IPv4.
    pub fn from_peer_addr(addr: SocketAddr) -> Self {
        let addr = match addr {
            SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
                Some(v4) => SocketAddr::V4(SocketAddrV4::new(v4, v6.port())),
                None => addr,
            },
            SocketAddr::V4(_) => addr,
        };
        Self { addr }
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Address of the client's data listener: the peer's IP (and IPv6
    /// scope) with the client-supplied port.
    pub fn data_addr(&self, port: u16) -> SocketAddr {
        match self.addr {
            SocketAddr::V4(v4) => SocketAddr::V4(SocketAddrV4::new(*v4.ip(), port)),
            SocketAddr::V6(v6) => {
                SocketAddr::V6(SocketAddrV6::new(*v6.ip(), port, v6.flowinfo(), v6.scope_id()))
            }
        }
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr.ip())
    }
}

/// An established data connection.
///
/// Dropping it closes the socket; [`finish`](Self::finish) additionally
/// sends a clean end-of-stream first.
#[derive(Debug)]
pub struct DataChannel {
    stream: TcpStream,
    peer: SocketAddr,
}

impl DataChannel {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub fn into_inner(self) -> TcpStream {
        self.stream
    }

    /// Shuts down the write side, signalling end-of-data to the peer.
    pub async fn finish(mut self) -> Result<(), RendezvousError> {
        self.stream.shutdown().await?;
        debug!(peer = %self.peer, "data channel closed");
        Ok(())
    }
}

/// Opens data connections back to clients.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    connect_timeout: Duration,
    cancel: CancellationToken,
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new(DATA_CONNECT_TIMEOUT, CancellationToken::new())
    }
}

impl Rendezvous {
    pub fn new(connect_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            connect_timeout,
            cancel,
        }
    }

    /// Connects to `port` at the address the control connection came from.
    pub async fn connect_back(
        &self,
        control: &TcpStream,
        port: u16,
    ) -> Result<DataChannel, RendezvousError> {
        let peer = PeerIdentity::from_control(control)?;
        self.connect_to(peer, port).await
    }

    /// Connects to `port` on `peer`.
    pub async fn connect_to(
        &self,
        peer: PeerIdentity,
        port: u16,
    ) -> Result<DataChannel, RendezvousError> {
        if port == 0 {
            return Err(RendezvousError::InvalidPort(port));
        }
        let addr = peer.data_addr(port);

        let stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(RendezvousError::Cancelled);
            }
            result = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)) => {
                match result {
                    Ok(Ok(s)) => s,
                    Ok(Err(e)) => return Err(RendezvousError::Unreachable { addr, source: e }),
                    Err(_) => return Err(RendezvousError::Timeout(addr)),
                }
            }
        };

        info!(%addr, "data channel connected");
        Ok(DataChannel::new(stream, addr))
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    /// Returns (server side of a control connection, client side).
    async fn control_pair(bind: &str) -> Option<(TcpStream, TcpStream)> {
        let listener = TcpListener::bind(bind).await.ok()?;
        let addr = listener.local_addr().ok()?;
        let client = TcpStream::connect(addr).await.ok()?;
        let (server, _) = listener.accept().await.ok()?;
        Some((server, client))
    }

    #[test]
    fn mapped_ipv6_is_reported_as_ipv4() {
        let mapped = Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped();
        let peer = PeerIdentity::from_peer_addr(SocketAddr::new(mapped.into(), 5555));
        assert_eq!(peer.ip(), IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
        assert_eq!(peer.to_string(), "10.1.2.3");
        assert_eq!(peer.data_addr(7000), "10.1.2.3:7000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn ipv6_keeps_scope() {
        let addr = SocketAddr::V6(SocketAddrV6::new(
            "fe80::1".parse::<Ipv6Addr>().unwrap(),
            5555,
            0,
            3,
        ));
        let peer = PeerIdentity::from_peer_addr(addr);
        match peer.data_addr(7000) {
            SocketAddr::V6(v6) => {
                assert_eq!(v6.port(), 7000);
                assert_eq!(v6.scope_id(), 3);
            }
            other => panic!("expected IPv6, got {other}"),
        }
    }

    #[tokio::test]
    async fn connects_back_to_peer_port() {
        let (control, _client) = control_pair("127.0.0.1:0").await.unwrap();
        let data_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = data_listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = data_listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let rendezvous = Rendezvous::default();
        let mut channel = rendezvous.connect_back(&control, port).await.unwrap();
        assert_eq!(channel.peer_addr().port(), port);
        channel.stream_mut().write_all(b"listing").await.unwrap();
        channel.finish().await.unwrap();

        assert_eq!(accept.await.unwrap(), b"listing");
    }

    #[tokio::test]
    async fn connects_back_over_ipv6() {
        // Hosts without IPv6 loopback skip this test.
        let Some((control, _client)) = control_pair("[::1]:0").await else {
            return;
        };
        let data_listener = TcpListener::bind("[::1]:0").await.unwrap();
        let port = data_listener.local_addr().unwrap().port();

        let rendezvous = Rendezvous::default();
        let (channel, accepted) =
            tokio::join!(rendezvous.connect_back(&control, port), data_listener.accept());
        let channel = channel.unwrap();
        assert!(channel.peer_addr().is_ipv6());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn refused_port_is_unreachable() {
        let (control, _client) = control_pair("127.0.0.1:0").await.unwrap();
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = closed.local_addr().unwrap().port();
        drop(closed);

        let err = Rendezvous::default()
            .connect_back(&control, port)
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn zero_port_is_rejected() {
        let (control, _client) = control_pair("127.0.0.1:0").await.unwrap();
        let err = Rendezvous::default()
            .connect_back(&control, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, RendezvousError::InvalidPort(0)));
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let (control, _client) = control_pair("127.0.0.1:0").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let rendezvous = Rendezvous::new(DATA_CONNECT_TIMEOUT, cancel);
        let err = rendezvous.connect_back(&control, 9).await.unwrap_err();
        assert!(matches!(err, RendezvousError::Cancelled));
    }
}
