//! ftclient entry point.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{ArgGroup, Parser};
use ftserve_client::{ClientConfig, ClientError, FileClient, WireFormat};
use tracing_subscriber::EnvFilter;

/// Lists or fetches files from an ftserver.
#[derive(Parser, Debug)]
#[command(version, about)]
#[command(group(ArgGroup::new("command").required(true).args(["list", "get"])))]
struct Cli {
    /// Server host name or address.
    host: String,

    /// Server control port.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Port to receive the data connection on.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    data_port: u16,

    /// List the server's directory.
    #[arg(short = 'l', long)]
    list: bool,

    /// Fetch FILE into the current directory.
    #[arg(short = 'g', long, value_name = "FILE")]
    get: Option<String>,

    /// Send requests in the legacy text framing.
    #[arg(long)]
    legacy: bool,

    /// Replace an existing local file.
    #[arg(long)]
    overwrite: bool,
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
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().context("failed to start the runtime")?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let servers: Vec<_> = tokio::net::lookup_host((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("cannot resolve {}", cli.host))?
        .collect();
    if servers.is_empty() {
        bail!("{} has no addresses", cli.host);
    }

    let mut config = ClientConfig::with_servers(servers);
    config.data_port = cli.data_port;
    if cli.legacy {
        config.format = WireFormat::Legacy;
    }
    let client = FileClient::new(config);
    println!("Listening on data port {}", cli.data_port);

    let result = match &cli.get {
        None => list(&client).await,
        Some(name) => get(&client, name, cli.overwrite).await,
    };
    match result {
        Err(ClientError::Server(text)) => {
            println!("Message from server: {text}");
            std::process::exit(1);
        }
        Err(ClientError::FileExists(path)) => {
            eprintln!("{} already exists; pass --overwrite to replace it", path.display());
            std::process::exit(1);
        }
        other => other.with_context(|| format!("request to {} failed", cli.host)),
    }
}

async fn list(client: &FileClient) -> Result<(), ClientError> {
    let names = client.list().await?;
    println!("Directory contents:");
    for name in names {
        println!("{name}");
    }
    Ok(())
}

async fn get(client: &FileClient, name: &str, overwrite: bool) -> Result<(), ClientError> {
    let dest = local_name(name);
    println!("Transferring {name}.");
    let bytes = client.download(name, &dest, overwrite).await?;
    println!("Transfer complete ({bytes} bytes written to {}).", dest.display());
    Ok(())
}

/// Where a fetched file lands: its last path component, in the current
/// directory.
fn local_name(remote: &str) -> PathBuf {
    Path::new(remote)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(remote))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_and_get() {
        let cli = Cli::try_parse_from(["ftclient", "flip1", "5000", "-l", "5001"]).unwrap();
        assert!(cli.list);
        assert_eq!((cli.port, cli.data_port), (5000, 5001));

        let cli =
            Cli::try_parse_from(["ftclient", "flip1", "5000", "-g", "a.txt", "5001", "--legacy"])
                .unwrap();
        assert_eq!(cli.get.as_deref(), Some("a.txt"));
        assert!(cli.legacy);
    }

    #[test]
    fn requires_exactly_one_command() {
        assert!(Cli::try_parse_from(["ftclient", "flip1", "5000", "5001"]).is_err());
        assert!(
            Cli::try_parse_from(["ftclient", "flip1", "5000", "-l", "-g", "a", "5001"]).is_err()
        );
        assert!(Cli::try_parse_from(["ftclient", "flip1", "0", "-l", "5001"]).is_err());
    }

    #[test]
    fn downloads_land_in_current_directory() {
        assert_eq!(local_name("a.txt"), PathBuf::from("a.txt"));
        assert_eq!(local_name("sub/b.bin"), PathBuf::from("b.bin"));
    }
}
