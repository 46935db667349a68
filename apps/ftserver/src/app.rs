use std::sync::Arc;

use anyhow::Context;
use ftserve_server::{FileServer, ServerConfig};

/// Runs the server until Ctrl-C or a fatal socket error.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let server = FileServer::new(config);
    let mut serving = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };

    tokio::select! {
        result = &mut serving => {
            // Only a bind failure ends the server on its own.
            result?.context("file server failed")?;
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
        }
    }

    server.shutdown();
    serving.await?.context("file server failed")?;
    Ok(())
}
