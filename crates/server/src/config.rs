//! Runtime configuration for the server and its per-connection dispatcher.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub use ftserve_transfer::DEFAULT_CHUNK_SIZE;

/// Time allowed for a client to deliver its request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for connecting back to a client's data port.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = ftserve_data_channel::DATA_CONNECT_TIMEOUT;

/// Time a transfer may go without progress before it is abandoned.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_address: IpAddr,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    pub dispatcher: DispatcherConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Settings applied to every request.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Directory that listings enumerate and filenames resolve against.
    pub root: PathBuf,
    pub request_timeout: Duration,
    /// Deadline for connecting back to the client's data port.
    pub connect_timeout: Duration,
    /// Longest stall allowed while sending or draining.
    pub transfer_timeout: Duration,
    /// Bytes handed to the transport per write.
    pub chunk_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
