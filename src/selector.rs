//! Nearest-sample latency selection

use crate::trace::LatencyTrace;
use std::time::Duration;

/// One-way delay in whole milliseconds for the given elapsed time
///
/// Picks the trace sample nearest to `elapsed` and halves its round-trip
/// value, truncating toward zero.
pub fn closest_latency(trace: &LatencyTrace, elapsed: Duration) -> u32 {
    let (_, rtt_ms) = trace.nearest(elapsed.as_secs_f64());
    (rtt_ms / 2.0) as u32
}
