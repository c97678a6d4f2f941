//! Link configurator: applies delay/bandwidth/loss to both ends of a link

use crate::emulator::Emulator;
use crate::types::{ApplyOutcome, Endpoint, LinkId, LinkParameters};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Applies link parameters to one named link of an emulator
pub struct LinkConfigurator<E: ?Sized> {
    emulator: Arc<E>,
    link: LinkId,
}

impl<E: Emulator + ?Sized> LinkConfigurator<E> {
    pub fn new(emulator: Arc<E>, link: LinkId) -> Self {
        Self { emulator, link }
    }

    pub fn link(&self) -> &LinkId {
        &self.link
    }

    /// Resolve the link to its two endpoints
    pub async fn resolve(&self) -> Option<(Endpoint, Endpoint)> {
        self.emulator
            .interfaces(&self.link.host)
            .await
            .into_iter()
            .find(|intf| intf.name == self.link.dev)
            .and_then(|intf| {
                let local = Endpoint::new(self.link.host.clone(), intf.name);
                intf.peer.map(|peer| (local, peer))
            })
    }

    /// Apply `params` symmetrically to both directions of the link
    ///
    /// An unresolvable link is a silent no-op for the caller; the returned
    /// outcome says what happened.
    pub async fn apply(&self, params: &LinkParameters) -> ApplyOutcome {
        let Some((local, peer)) = self.resolve().await else {
            warn!("Link {} not found, configuration skipped", self.link);
            return ApplyOutcome::Unresolved;
        };

        debug!("Configuring {} <-> {}: {}", local, peer, params);
        for endpoint in [&local, &peer] {
            if let Err(e) = self.emulator.set_link_params(endpoint, params).await {
                error!("Failed to configure {}: {}", endpoint, e);
                return ApplyOutcome::Failed(e.to_string());
            }
        }

        ApplyOutcome::Applied
    }
}

impl<E: ?Sized> Clone for LinkConfigurator<E> {
    fn clone(&self) -> Self {
        Self {
            emulator: self.emulator.clone(),
            link: self.link.clone(),
        }
    }
}
