//! Command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use yt_audio_archiver::core::engine::YtDlpEngine;
use yt_audio_archiver::core::models::PullReport;
use yt_audio_archiver::core::url_list::read_url_list;
use yt_audio_archiver::core::{AppConfig, Fetcher, HistoryStore};
use yt_audio_archiver::utils::logging::init_tracing;

const EXIT_CONFIG: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "yt-audio-archiver", version, about = "Batch YouTube audio archiver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every new item behind the URLs in a list file
    Run {
        /// Newline-separated list of video/playlist URLs
        #[arg(long)]
        urls_file: PathBuf,

        /// Configuration file (YAML, JSON or TOML)
        #[arg(long)]
        config: PathBuf,
    },

    /// Print the download history
    History {
        /// Configuration file (YAML, JSON or TOML)
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match Cli::parse().command {
        Command::Run { urls_file, config } => run(&urls_file, &config).await,
        Command::History { config } => print_history(&config),
    }
}

async fn run(urls_file: &PathBuf, config_path: &PathBuf) -> ExitCode {
    let config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let urls = match read_url_list(urls_file) {
        Ok(urls) => urls,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if urls.is_empty() {
        info!("no URLs to process");
        return ExitCode::SUCCESS;
    }

    let engine = YtDlpEngine::new(
        &config.ytdlp_bin,
        config.probe_timeout_secs,
        config.download_timeout_secs,
    );
    if let Err(err) = engine.ensure_available().await {
        error!("{err}");
        return ExitCode::from(EXIT_CONFIG);
    }

    let history = HistoryStore::load(&config.history_file);
    info!(
        "{} items in history, {} URLs to process",
        history.len(),
        urls.len()
    );

    let mut fetcher = match Fetcher::new(engine, history, config.output_dir.clone()) {
        Ok(fetcher) => fetcher,
        Err(err) => {
            error!("cannot prepare output directory: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let mut totals = PullReport::default();
    let mut interrupted = false;
    for url in &urls {
        info!("processing {url}");
        tokio::select! {
            result = fetcher.process(url) => match result {
                Ok(report) => totals.merge(&report),
                Err(err) => {
                    error!("failed to process {url}: {err}");
                    totals.failed += 1;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, stopping after current item");
                interrupted = true;
                break;
            }
        }
    }

    info!(
        "done: {} downloaded, {} already present, {} failed ({} items in library)",
        totals.downloaded,
        totals.skipped,
        totals.failed,
        fetcher.history().len()
    );

    if interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_history(config_path: &PathBuf) -> ExitCode {
    let config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let store = HistoryStore::load(&config.history_file);
    if store.is_empty() {
        println!("No items downloaded yet.");
        return ExitCode::SUCCESS;
    }

    let mut entries = store.all_entries();
    entries.sort_by(|a, b| b.download_date.cmp(&a.download_date));

    println!("{} items:", entries.len());
    for entry in entries {
        println!(
            "{}  {}  {}",
            entry.download_date.format("%Y-%m-%d %H:%M"),
            entry.video_id,
            entry.filename
        );
        if let Some(album) = &entry.album {
            println!("    album:  {album}");
        }
        if let Some(artist) = &entry.artist {
            println!("    artist: {artist}");
        }
    }
    ExitCode::SUCCESS
}
