//! Control-channel wire format for ftserve.
//!
//! A client sends exactly one request per control connection, naming a
//! command and the port it listens on for the data connection. The server
//! answers with short text replies while bulk bytes travel on the data
//! channel.
//!
//! See [`request`] for the request encodings and [`reply`] for the replies.

pub mod constants;
pub mod error;
pub mod reply;
pub mod request;

pub use error::ProtocolError;
pub use reply::{Reply, read_reply};
pub use request::{
    Command, FrameStatus, Request, WireFormat, decode_request, encode_frame,
    encode_legacy_request, frame_status,
};
