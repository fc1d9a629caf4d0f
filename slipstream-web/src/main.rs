//! Slipstream server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use slipstream_core::config::SlipstreamConfig;
use slipstream_core::session::SessionManager;
use slipstream_core::streaming::{FfprobeProber, Remuxer};
use slipstream_core::torrent::{RqbitClient, TorrentClient};
use slipstream_core::tracing_setup::{CliLogLevel, TracingOptions, init_tracing};
use slipstream_search::{DevelopmentProvider, SearchService};
use slipstream_web::{AppState, run_server};

#[derive(Parser)]
#[command(name = "slipstream")]
#[command(about = "Torrent-to-HTTP media streaming gateway")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: CliLogLevel,

    /// HTTP listen port (overrides SLIPSTREAM_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Data directory (overrides SLIPSTREAM_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = SlipstreamConfig::from_env();
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    init_tracing(&TracingOptions::with_data_dir(
        cli.log_level.as_tracing_level(),
        &config.storage.data_dir,
    ))?;

    let client: Arc<dyn TorrentClient> =
        Arc::new(RqbitClient::new(&config.torrent, &config.storage).await?);
    let prober = Arc::new(FfprobeProber::new(&config.media));
    let sessions = Arc::new(SessionManager::new(client, prober));
    let remuxer = Arc::new(Remuxer::new(&config.media));

    let mut search = SearchService::new();
    search.register(Arc::new(DevelopmentProvider::new()));

    run_server(
        &config,
        AppState {
            sessions,
            remuxer,
            search,
        },
    )
    .await
}
