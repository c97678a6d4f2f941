//! In-memory emulator
//!
//! Stands in for the namespace backend in tests and `--dry-run` mode. It keeps
//! the current parameters of every interface and a log of every call.

use crate::emulator::{Emulator, Interface};
use crate::errors::{NetemError, Result};
use crate::topology::Topology;
use crate::types::{Endpoint, LinkParameters};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use tracing::info;

/// A recorded `set_link_params` call
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub at: Instant,
    pub endpoint: Endpoint,
    pub params: LinkParameters,
}

#[derive(Debug, Default)]
pub struct SimulatedEmulator {
    topology: Topology,
    state: Mutex<HashMap<Endpoint, LinkParameters>>,
    calls: Mutex<Vec<RecordedCall>>,
    failing: Mutex<HashSet<Endpoint>>,
}

impl SimulatedEmulator {
    /// Emulator whose links start with the topology's initial parameters
    pub fn from_topology(topology: &Topology) -> Self {
        let state = topology
            .links
            .iter()
            .flat_map(|link| {
                [
                    (link.a.clone(), link.params.clone()),
                    (link.b.clone(), link.params.clone()),
                ]
            })
            .collect();

        Self {
            topology: topology.clone(),
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Current parameters of one interface
    pub fn params_of(&self, endpoint: &Endpoint) -> Option<LinkParameters> {
        self.state.lock().get(endpoint).cloned()
    }

    /// Snapshot of every interface's parameters
    pub fn state(&self) -> HashMap<Endpoint, LinkParameters> {
        self.state.lock().clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Make every future call for `endpoint` fail
    pub fn fail_on(&self, endpoint: Endpoint) {
        self.failing.lock().insert(endpoint);
    }
}

#[async_trait]
impl Emulator for SimulatedEmulator {
    async fn interfaces(&self, host: &str) -> Vec<Interface> {
        self.topology.interfaces(host)
    }

    async fn set_link_params(&self, endpoint: &Endpoint, params: &LinkParameters) -> Result<()> {
        if self.failing.lock().contains(endpoint) {
            return Err(NetemError::CommandFailed {
                command: format!("set {}", endpoint),
                stderr: "simulated failure".to_string(),
            });
        }

        self.calls.lock().push(RecordedCall {
            at: Instant::now(),
            endpoint: endpoint.clone(),
            params: params.clone(),
        });
        self.state.lock().insert(endpoint.clone(), params.clone());
        info!("[sim] {} <- {}", endpoint, params);
        Ok(())
    }
}
