//! Convert raw ping logs into latency trace CSV files
//!
//! Input lines look like `2024-05-01 12:00:00.123456, 41.7` after a single
//! header line. Unlike [`crate::trace::LatencyTrace::load`], malformed lines
//! are skipped with a warning instead of aborting the conversion.

use crate::errors::Result;
use chrono::NaiveDateTime;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use tracing::{info, warn};

const INPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Clone, Debug, PartialEq)]
pub struct PingSample {
    pub timestamp: NaiveDateTime,
    pub rtt_ms: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub rows_written: usize,
    pub rows_skipped: usize,
}

/// Parse one `timestamp, rtt` line
pub fn parse_ping_line(line: &str) -> std::result::Result<PingSample, String> {
    let mut fields = line.trim().split(',');
    let (Some(ts), Some(rtt), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err("expected exactly two comma-separated fields".to_string());
    };

    let ts = ts.trim();
    // `%.f` alone would also accept whole seconds
    if !ts.contains('.') {
        return Err(format!("timestamp {:?} has no fractional seconds", ts));
    }
    let timestamp = NaiveDateTime::parse_from_str(ts, INPUT_TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp {:?}: {}", ts, e))?;
    let rtt_ms = rtt
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad rtt {:?}: {}", rtt.trim(), e))?;

    Ok(PingSample { timestamp, rtt_ms })
}

/// Read every valid sample, skipping the header, blank and malformed lines
pub fn read_ping_log<R: Read>(reader: R) -> Result<(Vec<PingSample>, usize)> {
    let mut samples = Vec::new();
    let mut skipped = 0;

    for line in BufReader::new(reader).lines().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_ping_line(&line) {
            Ok(sample) => samples.push(sample),
            Err(reason) => {
                warn!("Skipping line {:?}: {}", line.trim(), reason);
                skipped += 1;
            }
        }
    }

    Ok((samples, skipped))
}

/// Write samples as `timestamp,relative,rtt`, relative to the first sample
///
/// Samples stamped before the first one would get a negative relative time,
/// which no trace accepts, so they are dropped. Returns the rows written.
pub fn write_trace_csv<W: Write>(writer: W, samples: &[PingSample]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "relative", "rtt"])?;

    let mut written = 0;
    if let Some(base) = samples.first().map(|s| s.timestamp) {
        for sample in samples {
            if sample.timestamp < base {
                warn!(
                    "Skipping sample at {} taken before the first sample {}",
                    sample.timestamp.format(OUTPUT_TIMESTAMP_FORMAT),
                    base.format(OUTPUT_TIMESTAMP_FORMAT)
                );
                continue;
            }
            let relative = (sample.timestamp - base)
                .num_microseconds()
                .map(|us| us as f64 / 1e6)
                .unwrap_or_default();
            wtr.write_record([
                sample.timestamp.format(OUTPUT_TIMESTAMP_FORMAT).to_string(),
                format!("{:.3}", relative),
                format!("{:?}", sample.rtt_ms),
            ])?;
            written += 1;
        }
    }

    wtr.flush()?;
    Ok(written)
}

/// Convert a ping log file into a trace CSV file
///
/// Nothing is written when the log holds no valid samples.
pub fn convert_ping_log(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<ConversionReport> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let (samples, rows_skipped) = read_ping_log(std::fs::File::open(input)?)?;

    if samples.is_empty() {
        warn!("No valid data found in {}", input.display());
        return Ok(ConversionReport {
            rows_written: 0,
            rows_skipped,
        });
    }

    let rows_written = write_trace_csv(std::fs::File::create(output)?, &samples)?;
    let rows_skipped = rows_skipped + samples.len() - rows_written;
    info!(
        "Converted {} samples from {} to {} ({} skipped)",
        rows_written,
        input.display(),
        output.display(),
        rows_skipped
    );

    Ok(ConversionReport {
        rows_written,
        rows_skipped,
    })
}
