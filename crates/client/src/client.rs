use std::io;
use std::net::SocketAddr;
use std::path::Path;

use ftserve_data_channel::{DataChannel, DataListener};
use ftserve_protocol::{Command, ProtocolError, Reply, Request, read_reply};
use ftserve_transfer::{copy_to_end, recv_to_end};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// A client for one server. Each call runs its own control connection.
#[derive(Debug)]
pub struct FileClient {
    config: ClientConfig,
    cancel: CancellationToken,
}

/// Both channels of a request the server accepted.
struct Session {
    // Held open until the payload has been read.
    _control: TcpStream,
    data: DataChannel,
}

impl FileClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Aborts any call waiting for the server's data connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Fetches the names in the server's directory.
    pub async fn list(&self) -> Result<Vec<String>, ClientError> {
        let mut session = self.open(None).await?;
        let raw = recv_to_end(session.data.stream_mut(), self.config.max_payload).await?;
        let names = parse_listing(&raw);
        info!(entries = names.len(), bytes = raw.len(), "listing received");
        Ok(names)
    }

    /// Fetches a whole file into memory.
    pub async fn get(&self, filename: &str) -> Result<Vec<u8>, ClientError> {
        let mut session = self.open(Some(filename)).await?;
        let bytes = recv_to_end(session.data.stream_mut(), self.config.max_payload).await?;
        info!(filename, bytes = bytes.len(), "file received");
        Ok(bytes)
    }

    /// Fetches a file and writes it to `dest`.
    ///
    /// An existing `dest` is left alone unless `overwrite` is set. A partly
    /// written file is removed when the transfer fails. Returns the number
    /// of bytes written.
    pub async fn download(
        &self,
        filename: &str,
        dest: &Path,
        overwrite: bool,
    ) -> Result<u64, ClientError> {
        if !overwrite && tokio::fs::try_exists(dest).await? {
            return Err(ClientError::FileExists(dest.to_path_buf()));
        }

        let mut session = self.open(Some(filename)).await?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = options.open(dest).await.map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => ClientError::FileExists(dest.to_path_buf()),
            _ => e.into(),
        })?;

        match copy_to_end(session.data.stream_mut(), &mut file, self.config.max_payload).await {
            Ok(bytes) => {
                file.sync_all().await?;
                info!(filename, dest = %dest.display(), bytes, "file saved");
                Ok(bytes)
            }
            Err(e) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(dest).await {
                    warn!(dest = %dest.display(), "failed to remove partial file: {rm}");
                }
                Err(e.into())
            }
        }
    }

    /// Runs a request up to the point where payload bytes follow on the
    /// data channel.
    async fn open(&self, filename: Option<&str>) -> Result<Session, ClientError> {
        let (mut control, server) = self.connect().await?;
        let listener = DataListener::bind(self.config.data_addr(server)).await?;
        let request = match filename {
            Some(name) => Request::get(listener.port(), name)?,
            None => Request::list(listener.port())?,
        };

        control.write_all(&request.encode(self.config.format)).await?;
        control.flush().await?;
        debug!(
            command = ?request.command(),
            data_port = listener.port(),
            format = ?self.config.format,
            "request sent"
        );

        match read_reply(&mut control).await? {
            Reply::Continue => {}
            other => return Err(unexpected(other, "CONTINUE")),
        }

        let expected_peer = self.config.verify_peer.then(|| server.ip());
        let accept = listener.accept(expected_peer, self.config.accept_timeout, &self.cancel);
        tokio::pin!(accept);
        let data = tokio::select! {
            biased;
            data = &mut accept => data?,
            closed = control_closed(&control) => {
                if closed {
                    return Err(ClientError::Server(
                        "control connection closed before the data connection".into(),
                    ));
                }
                accept.await?
            }
        };

        if request.command() == Command::Get {
            match read_reply(&mut control).await? {
                Reply::Sending => {}
                other => return Err(unexpected(other, "SENDING")),
            }
        }

        Ok(Session {
            _control: control,
            data,
        })
    }

    /// Connects to the first configured address that accepts.
    async fn connect(&self) -> Result<(TcpStream, SocketAddr), ClientError> {
        let mut last_err = None;
        for &server in &self.config.servers {
            let timeout = self.config.connect_timeout;
            match tokio::time::timeout(timeout, TcpStream::connect(server)).await {
                Ok(Ok(stream)) => return Ok((stream, server)),
                Ok(Err(e)) => {
                    debug!(%server, "connect failed: {e}");
                    last_err = Some(e);
                }
                Err(_) => {
                    debug!(%server, "connect timed out");
                    last_err = Some(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connecting to {server} timed out"),
                    ));
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "no server address configured")
            })
            .into())
    }
}

/// Splits a listing payload into names.
pub fn parse_listing(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}

/// Resolves once the server closes the control channel (`true`) or sends
/// something on it (`false`).
async fn control_closed(control: &TcpStream) -> bool {
    let mut byte = [0u8; 1];
    !matches!(control.peek(&mut byte).await, Ok(n) if n > 0)
}

fn unexpected(reply: Reply, wanted: &str) -> ClientError {
    match reply.error_detail() {
        Some(detail) => ClientError::Server(detail.to_string()),
        None => ProtocolError::MalformedReply(format!("expected {wanted}, got {reply:?}")).into(),
    }
}
