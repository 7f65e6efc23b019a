//! Ledger node
//!
//! Binds the UDP listener, then reads one command per line from stdin.

use anyhow::Context;
use clap::Parser;
use p2pledger::node::{Command, Node, NodeConfig, USAGE};
use p2pledger::transport::UdpTransport;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ledger node CLI
#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Replicated hash-linked ledger node")]
struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address peers use to reach this node
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// Socket address to bind (defaults to all interfaces on the address port)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Peer address; repeat for each peer
    #[arg(short, long = "peer")]
    peers: Vec<SocketAddr>,

    /// Directory holding block files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// How long to wait for peer replies, in milliseconds
    #[arg(long)]
    collect_timeout_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(address) = self.address {
            config = config.with_address(address);
        }
        if let Some(listen) = self.listen {
            config = config.with_listen(listen);
        }
        if !self.peers.is_empty() {
            config = config.with_peers(self.peers);
        }
        if let Some(dir) = self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(ms) = self.collect_timeout_ms {
            config = config.with_collect_timeout_ms(ms);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Args::parse().into_config()?;

    let transport = UdpTransport::bind(config.udp_config())
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    let node = Node::new(config, transport)?;
    let listener = node.spawn_listener();

    info!(address = %node.address(), peers = node.peers().len(), "Ledger node ready");
    println!("{}", USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}\n{}", e, USAGE);
                continue;
            }
        };

        match node.execute(command).await {
            Ok(output) => println!("{}", output),
            Err(e) => {
                warn!(error = %e, "Command failed");
                println!("{}", e);
            }
        }
    }

    info!("Input closed, shutting down");
    listener.abort();
    Ok(())
}
