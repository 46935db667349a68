use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use ftserve_data_channel::DATA_ACCEPT_TIMEOUT;
use ftserve_protocol::WireFormat;

/// Time allowed for the control connection to be established.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest listing or file the client accepts (1 GiB).
pub const DEFAULT_MAX_PAYLOAD: u64 = 1024 * 1024 * 1024;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Control addresses of the server, tried in order until one accepts.
    pub servers: Vec<SocketAddr>,
    /// Address the data listener binds; `None` picks the unspecified
    /// address of the family the control connection ended up on.
    pub data_bind: Option<IpAddr>,
    /// Data port announced to the server (0 = OS-assigned).
    pub data_port: u16,
    pub format: WireFormat,
    pub connect_timeout: Duration,
    /// How long to wait for the server's data connection.
    pub accept_timeout: Duration,
    /// Drop data connections that do not come from the server's IP.
    pub verify_peer: bool,
    pub max_payload: u64,
}

impl ClientConfig {
    pub fn new(server: SocketAddr) -> Self {
        Self::with_servers([server])
    }

    /// Configuration for a host that resolved to several addresses.
    pub fn with_servers(servers: impl IntoIterator<Item = SocketAddr>) -> Self {
        Self {
            servers: servers.into_iter().collect(),
            data_bind: None,
            data_port: 0,
            format: WireFormat::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            accept_timeout: DATA_ACCEPT_TIMEOUT,
            verify_peer: true,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub(crate) fn data_addr(&self, server: SocketAddr) -> SocketAddr {
        let ip = self.data_bind.unwrap_or(match server {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        });
        SocketAddr::new(ip, self.data_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn data_listener_follows_server_family() {
        let mut cfg = ClientConfig::with_servers([addr("[::1]:4000"), addr("10.0.0.2:4000")]);
        assert_eq!(cfg.data_addr(addr("10.0.0.2:4000")), addr("0.0.0.0:0"));

        cfg.data_port = 5001;
        assert_eq!(cfg.data_addr(addr("[::1]:4000")), addr("[::]:5001"));
    }

    #[test]
    fn explicit_bind_wins() {
        let mut cfg = ClientConfig::new(addr("10.0.0.2:4000"));
        cfg.data_bind = Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(cfg.data_addr(addr("10.0.0.2:4000")).ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(cfg.format, WireFormat::Versioned);
    }

    #[test]
    fn keeps_every_resolved_address_in_order() {
        let cfg = ClientConfig::with_servers([addr("[::1]:4000"), addr("127.0.0.1:4000")]);
        assert_eq!(cfg.servers, vec![addr("[::1]:4000"), addr("127.0.0.1:4000")]);
        assert_eq!(ClientConfig::new(addr("127.0.0.1:4000")).servers.len(), 1);
    }
}
