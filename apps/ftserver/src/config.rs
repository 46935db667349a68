//! Server configuration file.
//!
//! Optional TOML; every key has a default, and command-line flags override
//! whatever the file sets. Durations are whole seconds.
//!
//! ```toml
//! bind_address = "0.0.0.0"
//! root = "/srv/files"
//! request_timeout = 5
//! connect_timeout = 30
//! transfer_timeout = 60
//! chunk_size = 65536
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use ftserve_server::{DispatcherConfig, ServerConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Directory served to clients.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Seconds a client has to deliver its request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Seconds allowed for connecting back to the client's data port.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Seconds a transfer may stall before it is abandoned.
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_request_timeout() -> u64 {
    ftserve_server::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_connect_timeout() -> u64 {
    ftserve_server::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_transfer_timeout() -> u64 {
    ftserve_server::DEFAULT_TRANSFER_TIMEOUT.as_secs()
}

fn default_chunk_size() -> usize {
    ftserve_server::DEFAULT_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            root: default_root(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            transfer_timeout: default_transfer_timeout(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Loads `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Checks the values and builds the server configuration for `port`.
    pub fn into_server_config(self, port: u16) -> anyhow::Result<ServerConfig> {
        if !self.root.is_dir() {
            bail!("root {} is not a directory", self.root.display());
        }
        for (name, secs) in [
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
            ("transfer_timeout", self.transfer_timeout),
        ] {
            if secs == 0 {
                bail!("{name} must be at least one second");
            }
        }

        Ok(ServerConfig {
            bind_address: self.bind_address,
            port,
            dispatcher: DispatcherConfig {
                root: self.root,
                request_timeout: Duration::from_secs(self.request_timeout),
                connect_timeout: Duration::from_secs(self.connect_timeout),
                transfer_timeout: Duration::from_secs(self.transfer_timeout),
                chunk_size: self.chunk_size,
            },
        })
    }
}
