//! Per-connection request handling.
//!
//! One request per control connection moves through these steps:
//!
//! ```text
//! AwaitingRequest -> Validating -> ListingResponse -> Done
//!                               -> FileResponse    -> Done
//!                               -> ErrorResponse   -> Done
//! ```
//!
//! Malformed and unknown requests are answered on the control channel
//! alone. Valid requests get `CONTINUE`, after which the data channel is
//! opened back to the client before the command runs, so a retrieval of a
//! missing file still opens (and cleanly closes) an empty data channel.
//! Both channels are owned by the handler and close on every exit path.

use std::path::Path;
use std::time::Duration;

use ftserve_data_channel::{DataChannel, PeerIdentity, Rendezvous};
use ftserve_protocol::{Command, Reply, decode_request};
use ftserve_transfer::Transfer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ServerError;
use crate::config::DispatcherConfig;
use crate::listing::{list_root, render_listing};
use crate::paths::resolve_in_root;
use crate::request_reader::read_request;

/// How long a closing control channel waits for the client to hang up.
const CLOSE_LINGER: Duration = Duration::from_secs(1);

/// What a control connection ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Listing sent on the data channel.
    Listing { entries: usize, bytes: usize },
    /// File contents sent on the data channel.
    FileSent { bytes: usize },
    /// Requested file missing or unreadable; error sent on control.
    FileNotFound,
    /// Usage error sent on control.
    UnknownCommand,
    /// Request could not be decoded; error sent on control.
    Malformed,
}

/// Serves requests against one root directory.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: DispatcherConfig,
    rendezvous: Rendezvous,
    transfer: Transfer,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, cancel: CancellationToken) -> Self {
        let rendezvous = Rendezvous::new(config.connect_timeout, cancel);
        let transfer = Transfer::new(config.chunk_size, Some(config.transfer_timeout));
        Self {
            config,
            rendezvous,
            transfer,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handles one control connection from request to close.
    pub async fn handle(&self, mut control: TcpStream) -> Result<Outcome, ServerError> {
        let peer = PeerIdentity::from_control(&control)?;

        let raw = read_request(&mut control, self.config.request_timeout).await?;
        let request = match decode_request(&raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(%peer, "rejecting request: {e}");
                return self.reject(control, Reply::malformed(), Outcome::Malformed).await;
            }
        };
        info!(
            %peer,
            command = ?request.command(),
            port = request.reply_port(),
            "request received"
        );

        let filename = match (request.command(), request.filename()) {
            (Command::Unknown, _) => {
                info!(%peer, "invalid command, terminating connection");
                return self.reject(control, Reply::usage(), Outcome::UnknownCommand).await;
            }
            (Command::List, _) => None,
            (Command::Get, Some(name)) => Some(name),
            (Command::Get, None) => {
                return self.reject(control, Reply::malformed(), Outcome::Malformed).await;
            }
        };

        self.reply(&mut control, &Reply::Continue).await?;

        let mut data = self
            .rendezvous
            .connect_to(peer, request.reply_port())
            .await?;
        debug!(%peer, port = request.reply_port(), "data connection established");

        let outcome = match filename {
            None => self.send_listing(&mut data).await?,
            Some(name) => self.send_file(&mut control, &mut data, name).await?,
        };

        close_data(data).await;
        close_control(control).await;
        info!(%peer, ?outcome, "request fulfilled");
        Ok(outcome)
    }

    async fn send_listing(&self, data: &mut DataChannel) -> Result<Outcome, ServerError> {
        let names = list_root(&self.config.root).await?;
        let listing = render_listing(&names);
        debug!(entries = names.len(), "sending directory listing");

        let bytes = self
            .transfer
            .send_all_drained(data.stream_mut(), &listing)
            .await?;
        Ok(Outcome::Listing {
            entries: names.len(),
            bytes,
        })
    }

    async fn send_file(
        &self,
        control: &mut TcpStream,
        data: &mut DataChannel,
        filename: &str,
    ) -> Result<Outcome, ServerError> {
        let contents = match read_file(&self.config.root, filename).await {
            Some(contents) => contents,
            None => {
                info!(filename, "requested file not found");
                self.reply(control, &Reply::not_found(filename)).await?;
                return Ok(Outcome::FileNotFound);
            }
        };

        // The client waits for SENDING before it reads the data channel.
        self.reply(control, &Reply::Sending).await?;
        debug!(filename, size = contents.len(), "sending file contents");

        let bytes = self
            .transfer
            .send_all_drained(data.stream_mut(), &contents)
            .await?;
        Ok(Outcome::FileSent { bytes })
    }

    async fn reply(&self, control: &mut TcpStream, reply: &Reply) -> Result<(), ServerError> {
        self.transfer
            .send_all_drained(control, reply.encode())
            .await?;
        Ok(())
    }

    async fn reject(
        &self,
        mut control: TcpStream,
        reply: Reply,
        outcome: Outcome,
    ) -> Result<Outcome, ServerError> {
        self.reply(&mut control, &reply).await?;
        close_control(control).await;
        Ok(outcome)
    }
}

/// Reads a regular file inside `root`. Missing, unreadable, escaping and
/// non-regular paths all come back as `None`.
async fn read_file(root: &Path, filename: &str) -> Option<Vec<u8>> {
    let Some(path) = resolve_in_root(root, filename) else {
        warn!(filename, "refusing path outside the root directory");
        return None;
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return None,
        Err(e) => {
            debug!(path = %path.display(), "stat failed: {e}");
            return None;
        }
    }

    match tokio::fs::read(&path).await {
        Ok(contents) => Some(contents),
        Err(e) => {
            warn!(path = %path.display(), "read failed: {e}");
            None
        }
    }
}

async fn close_data(data: DataChannel) {
    let peer = data.peer_addr();
    if let Err(e) = data.finish().await {
        debug!(%peer, "data channel shutdown: {e}");
    }
}

/// Closes the control channel once the client has seen all replies.
///
/// Request bytes past the decoded frame (legacy padding) may still sit
/// unread; they are discarded until the client closes its side, so the
/// close does not turn into a reset.
async fn close_control(mut control: TcpStream) {
    if let Err(e) = control.shutdown().await {
        debug!("control channel shutdown: {e}");
        return;
    }
    let mut sink = [0u8; 256];
    let linger = async {
        while let Ok(n) = control.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(CLOSE_LINGER, linger).await;
}
