//! Trace-driven scheduler loop
//!
//! The loop applies a static baseline once, then on every tick looks up the
//! trace sample nearest to the elapsed time and pushes half of its round-trip
//! value to the link as one-way delay. After `max_updates` updates it stops
//! and the last configuration stays in place.
//!
//! ```text
//! Initializing -> ApplyingBaseline -> WaitingForTick -> ApplyingUpdate -+-> WaitingForTick
//!                                                                       +-> Terminal
//! ```

use crate::configurator::LinkConfigurator;
use crate::emulator::Emulator;
use crate::errors::{NetemError, Result};
use crate::selector::closest_latency;
use crate::signal::TickSignal;
use crate::trace::LatencyTrace;
use crate::trigger::{spawn_trigger, TriggerStats};
use crate::types::{ApplyOutcome, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerPhase {
    Initializing,
    ApplyingBaseline,
    WaitingForTick,
    ApplyingUpdate,
    Terminal,
}

/// Progress of the loop; owned by the loop alone
#[derive(Clone, Debug)]
pub struct SchedulerState {
    pub start: Instant,
    pub updates_applied: u32,
    pub max_updates: u32,
}

impl SchedulerState {
    pub fn new(start: Instant, max_updates: u32) -> Self {
        Self {
            start,
            updates_applied: 0,
            max_updates,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.updates_applied >= self.max_updates
    }
}

/// One trace-driven update as applied by the loop
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedUpdate {
    /// 1-based update number
    pub index: u32,
    pub elapsed: Duration,
    pub delay_ms: u32,
    pub outcome: ApplyOutcome,
}

/// Everything the loop applied before going terminal
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerReport {
    pub baseline: ApplyOutcome,
    pub updates: Vec<AppliedUpdate>,
}

impl SchedulerReport {
    /// Delay left on the link when the loop stopped
    pub fn final_delay_ms(&self) -> Option<u32> {
        self.updates.last().map(|u| u.delay_ms)
    }
}

pub struct LatencyScheduler<E: ?Sized> {
    config: SchedulerConfig,
    trace: Arc<LatencyTrace>,
    configurator: LinkConfigurator<E>,
    signal: Arc<TickSignal>,
    phase: watch::Sender<SchedulerPhase>,
}

impl<E: Emulator + ?Sized + 'static> LatencyScheduler<E> {
    pub fn new(config: SchedulerConfig, trace: Arc<LatencyTrace>, emulator: Arc<E>) -> Result<Self> {
        config.validate()?;
        let configurator = LinkConfigurator::new(emulator, config.link.clone());
        let (phase, _) = watch::channel(SchedulerPhase::Initializing);

        Ok(Self {
            config,
            trace,
            configurator,
            signal: Arc::new(TickSignal::new()),
            phase,
        })
    }

    /// Tick signal the loop waits on
    pub fn signal(&self) -> Arc<TickSignal> {
        self.signal.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerPhase> {
        self.phase.subscribe()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run the loop against the tick signal; no trigger is started
    ///
    /// Ticks must come from elsewhere (see [`Self::signal`]).
    pub async fn run(self) -> Result<SchedulerReport> {
        self.run_from(Instant::now()).await
    }

    /// Start the periodic trigger and the loop as two tasks
    pub fn start(self) -> SchedulerHandle {
        let start = Instant::now();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let trigger = spawn_trigger(start, self.config.step(), self.signal.clone(), shutdown_rx);
        let phase = self.subscribe();
        let signal = self.signal.clone();
        let task = tokio::spawn(self.run_from(start));

        SchedulerHandle {
            task: Some(task),
            trigger,
            shutdown_tx,
            phase,
            signal,
        }
    }

    async fn run_from(self, start: Instant) -> Result<SchedulerReport> {
        self.set_phase(SchedulerPhase::Initializing);
        let mut state = SchedulerState::new(start, self.config.max_updates);

        self.set_phase(SchedulerPhase::ApplyingBaseline);
        let baseline = self.configurator.apply(&self.config.baseline).await;
        info!(
            "Baseline on {}: {} ({:?})",
            self.configurator.link(),
            self.config.baseline,
            baseline
        );

        let mut updates = Vec::with_capacity(state.max_updates as usize);
        while !state.is_terminal() {
            self.set_phase(SchedulerPhase::WaitingForTick);
            self.wait_for_tick().await?;

            self.set_phase(SchedulerPhase::ApplyingUpdate);
            let elapsed = state.start.elapsed();
            let delay_ms = closest_latency(&self.trace, elapsed);
            let outcome = self
                .configurator
                .apply(&self.config.update_params(delay_ms))
                .await;
            self.signal.clear();
            state.updates_applied += 1;

            info!(
                "Update {}/{} at {:.3}s: delay={}ms ({:?})",
                state.updates_applied,
                state.max_updates,
                elapsed.as_secs_f64(),
                delay_ms,
                outcome
            );
            updates.push(AppliedUpdate {
                index: state.updates_applied,
                elapsed,
                delay_ms,
                outcome,
            });
        }

        self.set_phase(SchedulerPhase::Terminal);
        info!(
            "Scheduler finished after {} updates, link left at {}ms",
            state.updates_applied,
            updates.last().map(|u| u.delay_ms).unwrap_or(self.config.baseline.delay_ms)
        );

        Ok(SchedulerReport { baseline, updates })
    }

    async fn wait_for_tick(&self) -> Result<()> {
        match self.config.tick_timeout() {
            None => {
                self.signal.wait().await;
                Ok(())
            }
            Some(timeout) => time::timeout(timeout, self.signal.wait())
                .await
                .map_err(|_| {
                    warn!("No tick within {:?}, stopping scheduler", timeout);
                    NetemError::TickTimeout(timeout.as_millis() as u64)
                }),
        }
    }

    fn set_phase(&self, phase: SchedulerPhase) {
        debug!("Scheduler phase: {:?}", phase);
        self.phase.send_replace(phase);
    }
}

/// Running trigger and loop tasks
///
/// The trigger keeps ticking after the loop is terminal; its ticks are simply
/// never consumed. Call [`SchedulerHandle::shutdown`] to stop it.
pub struct SchedulerHandle {
    task: Option<JoinHandle<Result<SchedulerReport>>>,
    trigger: JoinHandle<TriggerStats>,
    shutdown_tx: oneshot::Sender<()>,
    phase: watch::Receiver<SchedulerPhase>,
    signal: Arc<TickSignal>,
}

impl SchedulerHandle {
    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.borrow()
    }

    pub fn signal(&self) -> Arc<TickSignal> {
        self.signal.clone()
    }

    /// Wait for the loop to go terminal
    pub async fn finished(&mut self) -> Result<SchedulerReport> {
        let task = self
            .task
            .take()
            .ok_or_else(|| NetemError::Task("scheduler result already taken".to_string()))?;
        task.await.map_err(|e| NetemError::Task(e.to_string()))?
    }

    /// Stop the trigger, abandoning the loop if it is still running
    pub async fn shutdown(self) -> Result<TriggerStats> {
        if let Some(task) = self.task {
            task.abort();
        }
        // The trigger may already be gone if it panicked
        let _ = self.shutdown_tx.send(());
        self.trigger
            .await
            .map_err(|e| NetemError::Task(e.to_string()))
    }
}
