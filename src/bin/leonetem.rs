//! Satellite link emulator CLI
//!
//! Builds the bent-pipe topology, applies the baseline to the satellite hop
//! and then replays the latency trace onto it until the update budget is
//! spent. The emulation stays up until Ctrl+C (or `--duration`).

use anyhow::{Context, Result};
use clap::Parser;
use leo_netem::{
    Emulator, LatencyScheduler, LatencyTrace, LinkId, NetnsEmulator, SchedulerConfig,
    SimulatedEmulator, Topology,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "leonetem", version, about = "LEO satellite link emulator", long_about = None)]
struct Cli {
    /// Latency trace file in CSV format
    #[arg(long)]
    latency: Option<PathBuf>,

    /// Scheduler configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host owning the shaped link
    #[arg(long)]
    host: Option<String>,

    /// Interface of the shaped link
    #[arg(long)]
    dev: Option<String>,

    /// Trigger cadence in milliseconds
    #[arg(long)]
    step_ms: Option<u64>,

    /// Number of trace-driven updates
    #[arg(long)]
    max_updates: Option<u32>,

    /// Stop if no tick arrives within this many milliseconds
    #[arg(long)]
    tick_timeout_ms: Option<u64>,

    /// Field delimiter of the trace file
    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Use the in-memory emulator instead of network namespaces
    #[arg(long)]
    dry_run: bool,

    /// Keep the emulation up for this many seconds instead of until Ctrl+C
    #[arg(long)]
    duration: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    async fn scheduler_config(&self) -> Result<SchedulerConfig> {
        let mut config = match &self.config {
            Some(path) => SchedulerConfig::from_file(path)
                .await
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SchedulerConfig::default(),
        };

        if self.host.is_some() || self.dev.is_some() {
            config.link = LinkId::new(
                self.host.clone().unwrap_or(config.link.host),
                self.dev.clone().unwrap_or(config.link.dev),
            );
        }
        if let Some(step_ms) = self.step_ms {
            config.step_ms = step_ms;
        }
        if let Some(max_updates) = self.max_updates {
            config.max_updates = max_updates;
        }
        if self.tick_timeout_ms.is_some() {
            config.tick_timeout_ms = self.tick_timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(latency) = cli.latency.clone() else {
        eprintln!("Please specify the latency trace file");
        std::process::exit(1);
    };

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("Using latency trace: {}", latency.display());

    anyhow::ensure!(
        cli.delimiter.is_ascii(),
        "trace delimiter must be an ASCII character, got {:?}",
        cli.delimiter
    );
    let trace = Arc::new(LatencyTrace::load_with_delimiter(
        &latency,
        cli.delimiter as u8,
    )?);
    let config = cli.scheduler_config().await?;
    let topology = Topology::bent_pipe();

    if cli.dry_run {
        let emulator = Arc::new(SimulatedEmulator::from_topology(&topology));
        return run_emulation(config, trace, emulator, cli.duration).await;
    }

    let emulator = Arc::new(NetnsEmulator::new(topology)?);
    if let Err(e) = emulator.up().await {
        emulator.down().await?;
        return Err(e).context("bringing up topology");
    }

    let result = run_emulation(config, trace, emulator.clone(), cli.duration).await;
    emulator.down().await?;
    result
}

async fn run_emulation<E: Emulator + 'static>(
    config: SchedulerConfig,
    trace: Arc<LatencyTrace>,
    emulator: Arc<E>,
    duration: Option<u64>,
) -> Result<()> {
    let mut handle = LatencyScheduler::new(config, trace, emulator)?.start();

    let stop = wait_for_stop(duration);
    tokio::pin!(stop);

    tokio::select! {
        result = handle.finished() => {
            match result {
                Ok(report) => info!(
                    "Trace replay done: {} updates, final delay {:?}ms",
                    report.updates.len(),
                    report.final_delay_ms()
                ),
                Err(e) => warn!("Scheduler stopped: {}", e),
            }
            info!("Emulation running, press Ctrl+C to stop");
            (&mut stop).await;
        }
        _ = &mut stop => {
            info!("Stopping before trace replay finished");
        }
    }

    let stats = handle.shutdown().await?;
    info!("Trigger stopped after {} ticks ({} late)", stats.ticks, stats.slips);
    Ok(())
}

async fn wait_for_stop(duration: Option<u64>) {
    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    }
}
