use anyhow::{Context, Result};
use clap::Parser;
use reactmon_daemon::{
    config::{Config, SourceConfig},
    daemon::DaemonState,
    protocol::Response,
    refresh::{refresh_loop, Refresher},
    socket::SocketServer,
    source,
    state::AggregationState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reactmon-daemon")]
#[command(version)]
#[command(about = "Aggregates call-tree snapshots into per-action latency histograms", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Poll the monitor at HOST[:PORT]
    #[arg(long, value_name = "HOST", conflicts_with = "file")]
    host: Option<String>,

    /// Load a saved snapshot instead of polling
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Unix socket to listen on
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Config {
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = if config_path.exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        })
    } else {
        info!("No config file found, using defaults");
        Config::default()
    };

    if let Some(host) = &cli.host {
        config.source = SourceConfig::remote(host.clone());
    }
    if let Some(file) = &cli.file {
        config.source = SourceConfig::file(file.clone());
    }
    if let Some(socket) = &cli.socket {
        config.server.socket_path = Some(socket.clone());
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("reactmon daemon starting...");

    let cli = Cli::parse();
    let config = load_config(&cli);

    let data_source = source::open(&config.source).context("failed to open data source")?;
    let refresher = Arc::new(Refresher::new(
        AggregationState::shared(),
        data_source,
        config.general.envelope.clone(),
    ));

    // First load runs before any client can connect so the first render is not empty.
    refresher.refresh().await;

    let socket_path = config
        .server
        .socket_path
        .clone()
        .unwrap_or_else(SocketServer::default_path);
    let server = SocketServer::bind(&socket_path)
        .await
        .with_context(|| format!("failed to bind {}", socket_path.display()))?;

    // Push every cycle outcome to connected clients
    let notifier = server.notifier();
    let mut cycles = refresher.subscribe();
    tokio::spawn(async move {
        loop {
            match cycles.recv().await {
                Ok(status) => {
                    // No connected clients is fine.
                    let _ = notifier.send(Response::Cycle { data: status });
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::spawn(refresh_loop(
        Arc::clone(&refresher),
        config.general.refresh_interval(),
    ));

    let state = Arc::new(DaemonState::new(refresher, config.general));
    info!("Daemon ready, listening for connections...");
    server.serve(state).await;
    Ok(())
}
