//! Convert a raw ping log into a latency trace CSV

use anyhow::Result;
use clap::Parser;
use leo_netem::convert::convert_ping_log;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ping2csv", version, about = "Convert ping logs to latency trace CSV", long_about = None)]
struct Cli {
    /// Ping log with `timestamp, rtt` lines
    input: PathBuf,

    /// Trace CSV to write
    output: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let report = convert_ping_log(&cli.input, &cli.output)?;
    if report.rows_written == 0 {
        println!("No valid data found.");
    } else {
        println!("Converted data written to {}", cli.output.display());
    }
    Ok(())
}
