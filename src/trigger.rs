//! Drift-corrected periodic trigger
//!
//! Fire times are computed from absolute targets (`start + k * step`) rather
//! than by sleeping a fixed interval after each tick, so per-tick processing
//! delay does not accumulate. When the trigger falls behind a target it fires
//! at once and restarts the cadence from the current time instead of
//! bursting the missed ticks.

use crate::signal::TickSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// What the trigger should do next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    /// Sleep until the absolute target, then fire
    At(Instant),
    /// The target has already passed; fire immediately
    Now,
}

/// Absolute-time tick schedule
#[derive(Clone, Debug)]
pub struct Cadence {
    step: Duration,
    next: Instant,
    slips: u64,
}

impl Cadence {
    pub fn new(start: Instant, step: Duration) -> Self {
        Self {
            step,
            next: start + step,
            slips: 0,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Absolute time of the next scheduled tick
    pub fn next_target(&self) -> Instant {
        self.next
    }

    pub fn poll(&self, now: Instant) -> Wake {
        if self.next > now {
            Wake::At(self.next)
        } else {
            Wake::Now
        }
    }

    /// Advance from the previous target after an on-time tick
    pub fn advance(&mut self) {
        self.next += self.step;
    }

    /// Restart the cadence from `now` after a late tick
    pub fn resync(&mut self, now: Instant) {
        self.next = now + self.step;
        self.slips += 1;
    }

    /// Number of late ticks absorbed
    pub fn slips(&self) -> u64 {
        self.slips
    }
}

/// Counters reported by a stopped trigger
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerStats {
    pub ticks: u64,
    pub slips: u64,
}

/// Spawn the trigger task; it runs until `shutdown_rx` fires or is dropped
pub fn spawn_trigger(
    start: Instant,
    step: Duration,
    signal: Arc<TickSignal>,
    shutdown_rx: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<TriggerStats> {
    tokio::spawn(async move {
        let mut cadence = Cadence::new(start, step);
        let mut stats = TriggerStats::default();
        let mut shutdown_rx = shutdown_rx;

        loop {
            match cadence.poll(Instant::now()) {
                Wake::At(target) => {
                    tokio::select! {
                        _ = time::sleep_until(target) => {
                            signal.set();
                            stats.ticks += 1;
                            cadence.advance();
                        }
                        _ = &mut shutdown_rx => {
                            debug!("Periodic trigger shutting down");
                            break;
                        }
                    }
                }
                Wake::Now => {
                    let now = Instant::now();
                    warn!(
                        "Trigger fell behind by {:?}, firing immediately",
                        now.saturating_duration_since(cadence.next_target())
                    );
                    signal.set();
                    stats.ticks += 1;
                    cadence.resync(now);
                    // Let a pending shutdown win between back-to-back late ticks
                    tokio::task::yield_now().await;
                }
            }
        }

        stats.slips = cadence.slips();
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_targets_are_absolute() {
        let start = Instant::now();
        let step = Duration::from_secs(1);
        let mut cadence = Cadence::new(start, step);

        for k in 1..=5u32 {
            // Processing delay after each tick does not shift the next target
            let late_wakeup = cadence.next_target() + Duration::from_millis(30);
            assert_eq!(cadence.next_target(), start + step * k);
            assert_eq!(
                cadence.poll(late_wakeup - Duration::from_millis(40)),
                Wake::At(start + step * k)
            );
            cadence.advance();
        }
        assert_eq!(cadence.slips(), 0);
    }

    #[test]
    fn test_cadence_resyncs_when_behind() {
        let start = Instant::now();
        let step = Duration::from_secs(1);
        let mut cadence = Cadence::new(start, step);

        // Stalled for 3.5 steps: one immediate tick, not three catch-up ticks
        let now = start + Duration::from_millis(3500);
        assert_eq!(cadence.poll(now), Wake::Now);
        cadence.resync(now);
        assert_eq!(cadence.poll(now), Wake::At(now + step));
        assert_eq!(cadence.slips(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_ticks_without_drift() {
        let signal = Arc::new(TickSignal::new());
        let step = Duration::from_millis(250);
        let start = Instant::now();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = spawn_trigger(start, step, signal.clone(), shutdown_rx);

        for k in 1..=8u32 {
            signal.wait().await;
            signal.clear();
            // Simulated per-tick work
            time::sleep(Duration::from_millis(20)).await;
            let fired_at = Instant::now() - Duration::from_millis(20);
            assert_eq!(fired_at, start + step * k);
        }

        shutdown_tx.send(()).unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats.ticks, 8);
        assert_eq!(stats.slips, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconsumed_ticks_coalesce() {
        let signal = Arc::new(TickSignal::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = spawn_trigger(
            Instant::now(),
            Duration::from_secs(1),
            signal.clone(),
            shutdown_rx,
        );

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(signal.fired(), 3);
        assert_eq!(signal.coalesced(), 2);
        assert!(signal.is_set());

        drop(shutdown_tx);
        let stats = task.await.unwrap();
        assert_eq!(stats.ticks, 3);
    }
}
