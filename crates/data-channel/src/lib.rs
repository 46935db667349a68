//! TCP data channel for bulk transfers.
//!
//! The client listens on a port of its choosing and names it in the
//! control-channel request. The server connects back to that port at the
//! address the control connection came from, never at an address supplied
//! by the client. Listings and file bytes travel on this second connection
//! while replies stay on the control channel.

pub mod error;
pub mod listener;
pub mod rendezvous;

pub use error::RendezvousError;
pub use listener::DataListener;
pub use rendezvous::{DataChannel, PeerIdentity, Rendezvous};

use std::time::Duration;

/// Timeout for the server's connection attempt back to the client.
pub const DATA_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the client waiting on the server's data connection.
pub const DATA_ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);
