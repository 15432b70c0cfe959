mod config;
mod downloader;
mod errors;
mod metadata;
mod routes;
mod security;
mod utils;

use clap::{Parser, Subcommand};
use log::{error, info};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::downloader::manager::DownloadManager;
use crate::downloader::strategies::YtDlpFetcher;
use crate::downloader::MediaFormat;
use crate::metadata::id3_embedder::Id3CoverEmbedder;
use crate::routes::AppState;

#[derive(Parser)]
#[command(name = "tubedrop", version, about = "Web front-end for yt-dlp downloads")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web interface (the default)
    Serve {
        /// Listen address, overrides the configured value
        #[arg(long)]
        bind: Option<String>,
    },
    /// Download a single URL and exit
    Get {
        url: String,
        /// Output format (mp3 or mp4)
        #[arg(long, default_value = "mp3")]
        format: MediaFormat,
    },
}

#[tokio::main]
async fn main() -> errors::Result<()> {
    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match AppConfig::load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            AppConfig::default()
        }
    };

    utils::ensure_dir_exists(&config.download_path).await?;

    let fetcher = Arc::new(YtDlpFetcher::new(config.ytdlp_binary.clone()));
    let embedder = Arc::new(Id3CoverEmbedder::new());
    let manager = DownloadManager::new(&config, fetcher, embedder);

    match cli.command {
        Some(Command::Get { url, format }) => run_get(&manager, &url, format).await,
        Some(Command::Serve { bind }) => {
            serve(manager, bind.unwrap_or_else(|| config.bind_address.clone())).await
        }
        None => serve(manager, config.bind_address.clone()).await,
    }
}

async fn serve(manager: DownloadManager, addr: String) -> errors::Result<()> {
    let app = routes::router(AppState { manager });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("tubedrop listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    // Graceful shutdown only; the process still dies when Ctrl+C fires.
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
}

async fn run_get(
    manager: &DownloadManager,
    url: &str,
    format: MediaFormat,
) -> errors::Result<()> {
    info!("Downloading {} as {}", url, format);
    let task = manager.run_inline(url, format).await?;
    if let Some(path) = task.result_path {
        println!("{}", path.display());
    }
    Ok(())
}
