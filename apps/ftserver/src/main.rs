//! ftserver entry point.

mod app;
mod config;

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Serves directory listings and files over a control connection plus a
/// data connection back to the client.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Control port to listen on.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Directory to serve (overrides the config file).
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Address to bind (overrides the config file).
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => {
            e.print()?;
            return Ok(());
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting ftserver");

    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.root = root;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    let server_config = config.into_server_config(cli.port)?;
    tracing::info!(root = %server_config.dispatcher.root.display(), "configuration loaded");

    let rt = tokio::runtime::Runtime::new().context("failed to start the runtime")?;
    rt.block_on(app::run(server_config))?;

    tracing::info!("server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_port_and_overrides() {
        let cli = Cli::try_parse_from(["ftserver", "30021", "--root", "/srv", "--bind", "::1"])
            .unwrap();
        assert_eq!(cli.port, 30021);
        assert_eq!(cli.root, Some(PathBuf::from("/srv")));
        assert_eq!(cli.bind, Some("::1".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn rejects_bad_ports() {
        assert!(Cli::try_parse_from(["ftserver"]).is_err());
        assert!(Cli::try_parse_from(["ftserver", "0"]).is_err());
        assert!(Cli::try_parse_from(["ftserver", "70000"]).is_err());
        assert!(Cli::try_parse_from(["ftserver", "http"]).is_err());
    }
}
