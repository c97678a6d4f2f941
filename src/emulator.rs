//! Boundary to the emulation environment
//!
//! The scheduler only needs two things from the environment: list the
//! interfaces of a host (with the far end of each attached link) and set
//! delay/bandwidth/loss on one interface.

use crate::errors::Result;
use crate::types::{Endpoint, LinkParameters};
use async_trait::async_trait;

/// An interface on a virtual host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    /// Far end of the link, if the interface is attached to one
    pub peer: Option<Endpoint>,
}

#[async_trait]
pub trait Emulator: Send + Sync {
    /// Interfaces of `host`; empty if the host is unknown
    async fn interfaces(&self, host: &str) -> Vec<Interface>;

    /// Shape egress traffic of one interface
    ///
    /// Applying the same parameters twice must leave the same state.
    async fn set_link_params(&self, endpoint: &Endpoint, params: &LinkParameters) -> Result<()>;
}
