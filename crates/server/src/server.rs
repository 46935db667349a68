//! Control-connection acceptor.
//!
//! Listens on a TCP port and hands every accepted connection to its own
//! task running the [`Dispatcher`]. Finished tasks are reaped as the loop
//! runs; a panicking handler is logged and forgotten.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::ServerError;
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;

/// The file server.
///
/// Create with [`FileServer::new`], drive with [`FileServer::run`], stop
/// with [`FileServer::shutdown`] from any task.
pub struct FileServer {
    listen_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl FileServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let listen_addr = config.listen_addr();
        let dispatcher = Dispatcher::new(config.dispatcher, cancel.child_token());
        Arc::new(Self {
            listen_addr,
            dispatcher: Arc::new(dispatcher),
            cancel,
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Stops accepting and cancels in-flight data connection attempts.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Binds the listener and serves until [`shutdown`](Self::shutdown).
    ///
    /// Fails only if the socket cannot be bound or the server is already
    /// running; per-connection errors are logged and never end the loop.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = {
            let mut bound = self.local_addr.lock().await;
            if bound.is_some() {
                return Err(ServerError::AlreadyRunning);
            }
            let listener = TcpListener::bind(self.listen_addr).await?;
            *bound = Some(listener.local_addr()?);
            listener
        };

        let local_addr = listener.local_addr()?;
        tracing::info!(
            root = %self.dispatcher.config().root.display(),
            "file server listening on {local_addr}"
        );

        let mut tasks = JoinSet::new();
        let result = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(%peer_addr, "control connection accepted");
                            let dispatcher = Arc::clone(&self.dispatcher);
                            tasks.spawn(async move {
                                if let Err(e) = dispatcher.handle(stream).await {
                                    tracing::error!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("connection task failed: {e}");
                    }
                }
            }
        };

        // In-flight handlers hold their own deadlines; the listener is
        // closed so no new work arrives while they finish.
        drop(listener);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("connection task failed: {e}");
            }
        }
        *self.local_addr.lock().await = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ftserve_protocol::{Request, WireFormat};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::config::DispatcherConfig;

    fn config(root: &std::path::Path) -> ServerConfig {
        ServerConfig {
            bind_address: [127, 0, 0, 1].into(),
            port: 0,
            dispatcher: DispatcherConfig {
                root: root.to_path_buf(),
                ..DispatcherConfig::default()
            },
        }
    }

    async fn wait_bound(server: &FileServer) -> SocketAddr {
        for _ in 0..100 {
            if let Some(addr) = server.local_addr().await {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("server never bound");
    }

    #[tokio::test]
    async fn binds_dynamic_port_and_shuts_down() {
        let tmp = tempfile::tempdir().unwrap();
        let server = FileServer::new(config(tmp.path()));
        assert_eq!(server.port().await, 0);

        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };
        let addr = wait_bound(&server).await;
        assert_ne!(addr.port(), 0);

        server.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(server.local_addr().await.is_none());
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let server = FileServer::new(config(tmp.path()));
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };
        wait_bound(&server).await;

        let err = server.run().await.unwrap_err();
        assert!(matches!(err, ServerError::AlreadyRunning));

        server.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn occupied_port_fails_to_bind() {
        let tmp = tempfile::tempdir().unwrap();
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut cfg = config(tmp.path());
        cfg.port = taken.local_addr().unwrap().port();

        let err = FileServer::new(cfg).run().await.unwrap_err();
        assert!(matches!(err, ServerError::Io(_)));
    }

    #[tokio::test]
    async fn serves_listing_and_survives_bad_clients() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("only.txt"), "x").unwrap();
        let server = FileServer::new(config(tmp.path()));
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };
        let addr = wait_bound(&server).await;

        // A client that connects and leaves without a word.
        drop(TcpStream::connect(addr).await.unwrap());

        let data = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_port = data.local_addr().unwrap().port();
        let mut control = TcpStream::connect(addr).await.unwrap();
        control
            .write_all(&Request::list(data_port).unwrap().encode(WireFormat::Versioned))
            .await
            .unwrap();

        let (mut data_stream, _) = data.accept().await.unwrap();
        let mut listing = Vec::new();
        data_stream.read_to_end(&mut listing).await.unwrap();
        assert_eq!(listing, b"only.txt\n");

        let mut reply = Vec::new();
        control.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"CONTINUE");
        drop(control);

        server.shutdown();
        runner.await.unwrap().unwrap();
    }
}
