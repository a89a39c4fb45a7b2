//! sysmon
//!
//! Terminal system monitor: samples CPU, memory, disk and network in the
//! background and redraws a dashboard at a fixed frame rate.

mod config;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysmon_core::display::MetricsSection;
use sysmon_core::{
    CpuMetrics, DiskMetrics, MemoryMetrics, Monitor, NetworkMetrics, SharedSnapshot,
    SystemSnapshot,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::{Config, OutputFormat};
use render::{TextRenderer, CLEAR_SCREEN};

/// How long `--once` waits for every family to report.
const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "sysmon")]
#[command(about = "Terminal system monitor")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a single frame once every metric has been sampled, then exit
    #[arg(long)]
    once: bool,

    /// Exit after drawing this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Output format (overrides the configuration file)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so frames on stdout stay intact
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path).context("Failed to load configuration")?;
            info!("Loaded configuration from: {}", path.display());
            config
        }
        None => Config::default(),
    };
    if let Some(format) = cli.format {
        config.format = format;
    }

    let snapshot = Arc::new(SharedSnapshot::new(config.history));
    let monitor = Monitor::new(snapshot);
    monitor.start();

    let result = if cli.once {
        print_first_snapshot(&monitor, &config).await
    } else {
        frame_loop(&monitor, &config, cli.frames).await
    };

    monitor.shutdown().await;
    result
}

/// Redraws the dashboard once per frame until interrupted.
async fn frame_loop(monitor: &Monitor, config: &Config, max_frames: Option<u64>) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let renderer = TextRenderer::new(config.color, config.bar_width);
    let clear = config.format == OutputFormat::Text && std::io::stdout().is_terminal();
    let mut ticker = tokio::time::interval(config.frame_interval());
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }

        let snapshot = monitor.get_snapshot();
        if !draw(&renderer, config.format, &snapshot, clear)? {
            break;
        }

        frames += 1;
        if max_frames.is_some_and(|max| frames >= max) {
            debug!("Drew {} frames, exiting", frames);
            break;
        }
    }

    Ok(())
}

/// Waits until every family has published, then draws one frame.
async fn print_first_snapshot(monitor: &Monitor, config: &Config) -> Result<()> {
    let deadline = Instant::now() + FIRST_SNAPSHOT_TIMEOUT;
    let mut snapshot = monitor.get_snapshot();
    while !is_complete(&snapshot) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
        snapshot = monitor.get_snapshot();
    }

    let renderer = TextRenderer::new(config.color, config.bar_width);
    draw(&renderer, config.format, &snapshot, false)?;
    Ok(())
}

/// Returns `true` once every metric family has a non-zero record.
fn is_complete(snapshot: &SystemSnapshot) -> bool {
    snapshot.cpu != CpuMetrics::default()
        && snapshot.memory != MemoryMetrics::default()
        && snapshot.disk != DiskMetrics::default()
        && snapshot.network != NetworkMetrics::default()
}

/// Writes one frame to stdout. Returns `false` when stdout has been closed.
fn draw(
    renderer: &TextRenderer,
    format: OutputFormat,
    snapshot: &SystemSnapshot,
    clear: bool,
) -> Result<bool> {
    let frame = match format {
        OutputFormat::Text => {
            let mut frame = renderer.render(&MetricsSection::all(snapshot));
            if clear {
                frame.insert_str(0, CLEAR_SCREEN);
            }
            frame
        }
        OutputFormat::Json => {
            let mut line =
                serde_json::to_string(snapshot).context("Failed to serialize snapshot")?;
            line.push('\n');
            line
        }
    };

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(frame.as_bytes()).and_then(|_| stdout.flush()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(false),
        Err(e) => Err(e).context("Failed to write frame"),
    }
}
