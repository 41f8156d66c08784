//! playlist-dl - download a playlist as tagged MP3 files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playlist_dl::types::{Event, Phase, RunReport};
use playlist_dl::{Config, PlaylistDownloader};

/// Download every track of a playlist as a 320 kbps MP3.
#[derive(Parser)]
#[command(name = "playlist-dl", version, about = "Download a playlist as tagged MP3 files")]
struct Cli {
    /// Playlist URL (with a `list` parameter) or bare playlist id.
    url: String,

    /// Directory that receives the playlist folder and archive.
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Directory for raw downloads awaiting conversion.
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Number of tracks processed at once.
    #[arg(long, short = 'c', value_parser = parse_concurrency)]
    concurrency: Option<usize>,

    /// Netscape-format cookies file for private playlists.
    #[arg(long)]
    cookies: Option<PathBuf>,

    /// Skip creating a ZIP archive of the finished playlist.
    #[arg(long)]
    no_archive: bool,

    /// Skip writing ID3 tags and cover art.
    #[arg(long)]
    no_metadata: bool,

    /// TOML configuration file; command-line flags take precedence.
    #[arg(long, env = "PLAYLIST_DL_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output (RUST_LOG overrides).
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    /// Load the configuration file, if any, and apply flag overrides
    fn into_config(self) -> playlist_dl::Result<(Config, String)> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };

        if let Some(dir) = self.output_dir {
            config.download.output_dir = dir;
        }
        if let Some(dir) = self.temp_dir {
            config.download.temp_dir = dir;
        }
        if let Some(concurrency) = self.concurrency {
            config.download.concurrency = concurrency;
        }
        if self.cookies.is_some() {
            config.download.cookies_file = self.cookies;
        }
        if self.no_archive {
            config.post_process.create_archive = false;
        }
        if self.no_metadata {
            config.post_process.write_metadata = false;
        }

        Ok((config, self.url))
    }
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "playlist_dl=debug"
    } else {
        "playlist_dl=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1))
        }
        Err(e) if e.is_preflight() => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            eprintln!("error: run aborted: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> playlist_dl::Result<RunReport> {
    let (config, url) = cli.into_config()?;
    let downloader = PlaylistDownloader::new(config)?;

    let printer = tokio::spawn(print_events(downloader.subscribe()));
    let finished = tokio::select! {
        result = downloader.run(&url) => Some(result),
        _ = wait_for_signal() => None,
    };
    drop(downloader);

    match finished {
        Some(result) => {
            // every sender is gone once the run returns, so the printer drains and exits
            printer.await.ok();
            result
        }
        None => {
            // jobs still hold senders; their yt-dlp/ffmpeg children die with the runtime
            printer.abort();
            Err(playlist_dl::Error::Other("interrupted".to_string()))
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Could not register SIGTERM handler, waiting for Ctrl+C only"
            );
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}

async fn print_events(mut rx: broadcast::Receiver<Event>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "progress output fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            Event::BatchStarted {
                name,
                total,
                concurrency,
            } => println!("Downloading \"{name}\": {total} tracks, {concurrency} at a time"),
            Event::Progress(p) if p.phase == Phase::Converting => {
                println!("  converting  {}", p.title);
            }
            Event::Progress(_) => {}
            Event::RetryScheduled {
                item_id,
                attempt,
                max_attempts,
                error,
            } => println!("  retrying    {item_id} (attempt {attempt}/{max_attempts}: {error})"),
            Event::ConnectivityLost => println!("Network unreachable, waiting for it to return"),
            Event::ConnectivityRestored { offline_secs } => {
                println!("Network back after {offline_secs}s, resuming");
            }
            Event::ItemFinished {
                result,
                finished,
                total,
                ..
            } => {
                if result.success {
                    println!("[{finished}/{total}] done    {}", result.title);
                } else {
                    println!(
                        "[{finished}/{total}] FAILED  {}: {}",
                        result.title,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            Event::BatchFinished { succeeded, failed } => {
                println!("Finished: {succeeded} succeeded, {failed} failed");
            }
            Event::TagFailed { item_id, error } => println!("  untagged    {item_id}: {error}"),
            Event::Archived(summary) => println!(
                "Archived {} files to {} ({} bytes)",
                summary.entry_count,
                summary.path.display(),
                summary.compressed_size
            ),
        }
    }
}

fn print_summary(report: &RunReport) {
    println!();
    println!(
        "{}: {} of {} tracks saved to {}",
        report.batch_name,
        report.succeeded(),
        report.results.len(),
        report.output_dir.display()
    );
    if report.tag_failures > 0 {
        println!("{} files could not be tagged", report.tag_failures);
    }
    if report.failed() > 0 {
        println!("Failed tracks:");
        for failure in report.failures() {
            println!(
                "  {:>3}. {} ({}): {}",
                failure.position + 1,
                failure.title,
                failure.item_id,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if let Some(archive) = &report.archive {
        println!("Archive: {}", archive.path.display());
    }
}
