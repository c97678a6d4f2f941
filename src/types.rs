//! Core types for trace-driven link emulation

use crate::errors::{NetemError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One end of a virtual link: an interface inside a host
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub intf: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, intf: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            intf: intf.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.intf)
    }
}

/// Identifies the link to shape by the host that owns it and the device name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkId {
    pub host: String,
    pub dev: String,
}

impl LinkId {
    pub fn new(host: impl Into<String>, dev: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            dev: dev.into(),
        }
    }
}

impl Default for LinkId {
    fn default() -> Self {
        // The satellite hop of the bent-pipe topology
        Self::new("router", "router-eth1")
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.dev)
    }
}

/// Delay, bandwidth and loss applied to both directions of a link
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkParameters {
    /// One-way delay in milliseconds
    pub delay_ms: u32,
    /// Bandwidth limit in megabits per second
    pub bandwidth_mbps: u32,
    /// Packet loss percentage (0.0-100.0)
    pub loss_pct: f64,
}

impl Default for LinkParameters {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            bandwidth_mbps: 100,
            loss_pct: 0.0,
        }
    }
}

impl LinkParameters {
    pub fn new(delay_ms: u32, bandwidth_mbps: u32, loss_pct: f64) -> Self {
        Self {
            delay_ms,
            bandwidth_mbps,
            loss_pct,
        }
    }

    /// Validate LinkParameters
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.loss_pct) {
            return Err(NetemError::InvalidParameter(format!(
                "loss_pct must be between 0.0 and 100.0, got {}",
                self.loss_pct
            )));
        }
        if self.bandwidth_mbps == 0 {
            return Err(NetemError::InvalidParameter(
                "bandwidth_mbps cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for LinkParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delay={}ms bw={}Mbit loss={}%",
            self.delay_ms, self.bandwidth_mbps, self.loss_pct
        )
    }
}

/// Result of a single link configuration attempt
///
/// The scheduler never fails on an unresolved link; the outcome is only
/// reported so callers and tests can tell a no-op from a real change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// Both directions of the link were configured
    Applied,
    /// No interface with the requested name and a peer exists on the host
    Unresolved,
    /// The emulator rejected the configuration
    Failed(String),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// Scheduler configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Link whose delay follows the trace
    pub link: LinkId,
    /// Trigger cadence in milliseconds
    pub step_ms: u64,
    /// Number of dynamic updates before the loop stops
    pub max_updates: u32,
    /// Static configuration applied before any trace-driven update
    pub baseline: LinkParameters,
    /// Bandwidth used for trace-driven updates
    pub bandwidth_mbps: u32,
    /// Loss used for trace-driven updates
    pub loss_pct: f64,
    /// Give up waiting for a tick after this long (None waits forever)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_timeout_ms: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            link: LinkId::default(),
            step_ms: 1000,
            max_updates: 10,
            baseline: LinkParameters::default(),
            bandwidth_mbps: 100,
            loss_pct: 0.0,
            tick_timeout_ms: None,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.link.host.is_empty() || self.link.dev.is_empty() {
            return Err(NetemError::InvalidParameter(
                "link host and dev must be non-empty".to_string(),
            ));
        }
        if self.step_ms == 0 {
            return Err(NetemError::InvalidParameter(
                "step_ms cannot be zero".to_string(),
            ));
        }
        if self.max_updates == 0 {
            return Err(NetemError::InvalidParameter(
                "max_updates cannot be zero".to_string(),
            ));
        }
        self.baseline.validate()?;
        self.update_params(0).validate()?;
        Ok(())
    }

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn tick_timeout(&self) -> Option<Duration> {
        self.tick_timeout_ms.map(Duration::from_millis)
    }

    /// Parameters for a trace-driven update with the given delay
    pub fn update_params(&self, delay_ms: u32) -> LinkParameters {
        LinkParameters::new(delay_ms, self.bandwidth_mbps, self.loss_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_bent_pipe_satellite_hop() {
        let config = SchedulerConfig::default();
        assert_eq!(config.link, LinkId::new("router", "router-eth1"));
        assert_eq!(config.step(), Duration::from_secs(1));
        assert_eq!(config.max_updates, 10);
        assert_eq!(config.baseline, LinkParameters::new(100, 100, 0.0));
        assert!(config.tick_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SchedulerConfig::from_json(r#"{"max_updates": 3, "step_ms": 250}"#).unwrap();
        assert_eq!(config.max_updates, 3);
        assert_eq!(config.step_ms, 250);
        assert_eq!(config.link, LinkId::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(SchedulerConfig::from_json(r#"{"step_ms": 0}"#).is_err());
        assert!(SchedulerConfig::from_json(r#"{"max_updates": 0}"#).is_err());
        assert!(SchedulerConfig::from_json(r#"{"loss_pct": 120.0}"#).is_err());
        assert!(SchedulerConfig::from_json(r#"{"link": {"host": "", "dev": "x"}}"#).is_err());
    }
}
