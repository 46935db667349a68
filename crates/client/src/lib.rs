//! Client side of the two-channel file protocol.
//!
//! For every request the client opens a data listener first, names its port
//! in the request sent on the control connection, and waits for the server
//! to connect back before reading the payload.

mod client;
mod config;
mod error;

pub use client::{FileClient, parse_listing};
pub use config::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_PAYLOAD};
pub use error::ClientError;

pub use ftserve_protocol::WireFormat;
