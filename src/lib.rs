//! Trace-driven satellite link emulation
//!
//! This crate replays a recorded latency trace onto one emulated link:
//! - Latency trace loading (strict CSV) and nearest-sample lookup
//! - Drift-corrected periodic trigger with coalescing ticks
//! - Scheduler loop applying a baseline then a bounded number of updates
//! - Linux namespace backend shaping links with `tc netem`
//! - Ping log to trace CSV conversion

pub mod configurator;
pub mod convert;
pub mod emulator;
pub mod errors;
pub mod netns;
pub mod scheduler;
pub mod selector;
pub mod signal;
pub mod testing;
pub mod topology;
pub mod trace;
pub mod trigger;
pub mod types;

// Re-exports for public API
pub use configurator::LinkConfigurator;
pub use emulator::{Emulator, Interface};
pub use errors::{NetemError, Result};
pub use netns::NetnsEmulator;
pub use scheduler::{LatencyScheduler, SchedulerHandle, SchedulerPhase, SchedulerReport};
pub use selector::closest_latency;
pub use signal::TickSignal;
pub use testing::SimulatedEmulator;
pub use topology::Topology;
pub use trace::LatencyTrace;
pub use types::*;
