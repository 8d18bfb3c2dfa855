use clap::Parser;
use p2pbank::node::Node;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Path to the TOML config file (created on first boot)
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Path to the account/ledger/peer database file
    #[arg(long, default_value = "bank.redb")]
    db: PathBuf,

    /// Overrides `p2p.host` from the config file
    #[arg(long)]
    host: Option<String>,

    /// Overrides `p2p.port` from the config file
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    Node(#[from] p2pbank::node::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn init_logging(log_dir: &str, log_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "p2pbank.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    guard
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let (mut node, _events) = Node::bootstrap(&cli.config, &cli.db)?;
    let _log_guard = init_logging(&node.config.app.log_dir, &node.config.app.log_level);

    if let Some(host) = cli.host {
        node.config.p2p.host = host;
    }
    if let Some(port) = cli.port {
        node.config.p2p.port = port;
    }

    node.run()?;
    tracing::info!(bank_code = %node.bank_code, "node is serving");

    // The server runs its accept loop on a background thread; keep the
    // process alive until an operator stops it.
    loop {
        std::thread::sleep(std::time::Duration::from_secs(3600));
    }
}
