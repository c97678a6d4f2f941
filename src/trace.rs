//! Latency trace store
//!
//! A trace maps elapsed experiment time (seconds) to a measured round-trip
//! latency (milliseconds). The file format is delimited text with one header
//! line followed by rows of `<ignored>,<elapsed_s>,<rtt_ms>[,...]`.
//!
//! Loading is strict: any row that does not yield two usable numbers aborts
//! the load. The converter in [`crate::convert`] is the lenient counterpart.

use crate::errors::{NetemError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::hash_map::{Entry, HashMap};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

const ELAPSED_FIELD: usize = 1;
const LATENCY_FIELD: usize = 2;
const HEADER_LINES: u64 = 1;

/// A non-empty, read-only latency trace
#[derive(Clone, Debug, PartialEq)]
pub struct LatencyTrace {
    /// (elapsed_s, rtt_ms) in first-seen order, keys unique
    samples: Vec<(f64, f64)>,
}

impl LatencyTrace {
    /// Load a comma-delimited trace file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_delimiter(path, b',')
    }

    /// Load a trace file using the given field delimiter
    pub fn load_with_delimiter(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| NetemError::TraceRead {
            path: path.to_path_buf(),
            source,
        })?;

        let trace = Self::from_reader(file, delimiter).map_err(|e| match e {
            NetemError::EmptyTrace(_) => NetemError::EmptyTrace(path.to_path_buf()),
            other => other,
        })?;

        info!(
            "Loaded latency trace {} ({} samples, {:.3}s..{:.3}s)",
            path.display(),
            trace.len(),
            trace.first_timestamp(),
            trace.last_timestamp()
        );
        Ok(trace)
    }

    /// Parse a trace from any reader; the first line is always discarded
    ///
    /// Exactly one physical line is dropped, whatever it holds. A blank row
    /// after it is malformed like any other unusable row.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let mut header = Vec::new();
        reader.read_until(b'\n', &mut header)?;
        let mut body = String::new();
        reader.read_to_string(&mut body)?;

        // The csv reader silently drops empty lines
        if let Some(index) = body.lines().position(|l| l.trim().is_empty()) {
            return Err(NetemError::TraceRow {
                line: index as u64 + 1 + HEADER_LINES,
                reason: "empty row".to_string(),
            });
        }

        let mut rows = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(delimiter)
            .from_reader(body.as_bytes());

        let mut samples = Vec::new();
        for record in rows.records() {
            samples.push(parse_row(&record?)?);
        }

        Self::from_samples(samples)
    }

    /// Build a trace from (elapsed_s, rtt_ms) pairs
    ///
    /// Duplicate timestamps keep the position of their first occurrence and
    /// the value of their last.
    pub fn from_samples(samples: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let mut unique: Vec<(f64, f64)> = Vec::new();
        let mut index: HashMap<u64, usize> = HashMap::new();

        for (elapsed, rtt) in samples {
            validate_sample(elapsed, rtt)?;
            match index.entry(key_bits(elapsed)) {
                Entry::Occupied(slot) => {
                    debug!("Duplicate trace timestamp {}s, replacing sample", elapsed);
                    unique[*slot.get()].1 = rtt;
                }
                Entry::Vacant(slot) => {
                    slot.insert(unique.len());
                    unique.push((elapsed, rtt));
                }
            }
        }

        if unique.is_empty() {
            return Err(NetemError::EmptyTrace(Default::default()));
        }
        Ok(Self { samples: unique })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed trace
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Round-trip latency recorded at exactly `elapsed_s`, if any
    pub fn get(&self, elapsed_s: f64) -> Option<f64> {
        self.samples
            .iter()
            .find(|(k, _)| *k == elapsed_s)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples.iter().copied()
    }

    /// Sample whose timestamp is closest to `elapsed_s`
    ///
    /// Full linear scan. Equidistant timestamps resolve to the earlier one,
    /// so the result does not depend on row order in the file.
    pub fn nearest(&self, elapsed_s: f64) -> (f64, f64) {
        let mut best = self.samples[0];
        let mut best_distance = (best.0 - elapsed_s).abs();

        for &(key, rtt) in &self.samples[1..] {
            let distance = (key - elapsed_s).abs();
            if distance < best_distance || (distance == best_distance && key < best.0) {
                best = (key, rtt);
                best_distance = distance;
            }
        }
        best
    }

    fn first_timestamp(&self) -> f64 {
        self.samples.iter().map(|(k, _)| *k).fold(f64::INFINITY, f64::min)
    }

    fn last_timestamp(&self) -> f64 {
        self.samples.iter().map(|(k, _)| *k).fold(0.0, f64::max)
    }
}

fn parse_row(record: &StringRecord) -> Result<(f64, f64)> {
    let line = record.position().map(|p| p.line()).unwrap_or(0) + HEADER_LINES;
    let field = |index: usize, name: &str| -> Result<f64> {
        let raw = record.get(index).ok_or_else(|| NetemError::TraceRow {
            line,
            reason: format!("missing {} column (field {})", name, index),
        })?;
        raw.parse::<f64>().map_err(|e| NetemError::TraceRow {
            line,
            reason: format!("{} {:?} is not a number: {}", name, raw, e),
        })
    };

    let elapsed = field(ELAPSED_FIELD, "elapsed time")?;
    let rtt = field(LATENCY_FIELD, "latency")?;
    validate_sample(elapsed, rtt).map_err(|e| NetemError::TraceRow {
        line,
        reason: e.to_string(),
    })?;
    Ok((elapsed, rtt))
}

/// Hash key for a timestamp; `-0.0` and `0.0` are the same instant
fn key_bits(elapsed: f64) -> u64 {
    if elapsed == 0.0 {
        0.0f64.to_bits()
    } else {
        elapsed.to_bits()
    }
}

fn validate_sample(elapsed: f64, rtt: f64) -> Result<()> {
    if !elapsed.is_finite() || elapsed < 0.0 {
        return Err(NetemError::InvalidParameter(format!(
            "elapsed time must be a non-negative number, got {}",
            elapsed
        )));
    }
    if !rtt.is_finite() || rtt < 0.0 {
        return Err(NetemError::InvalidParameter(format!(
            "latency must be a non-negative number, got {}",
            rtt
        )));
    }
    Ok(())
}
