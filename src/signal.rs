//! Coalescing tick signal shared by the trigger and the scheduler loop
//!
//! Behaves like a binary event: `set` raises the flag, `wait` blocks until
//! it is raised, `clear` lowers it. Setting an already raised flag is
//! absorbed, so at most one tick is ever pending.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TickSignal {
    pending: AtomicBool,
    notify: Notify,
    fired: AtomicU64,
    coalesced: AtomicU64,
}

impl TickSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns false when a tick was already pending.
    pub fn set(&self) -> bool {
        self.fired.fetch_add(1, Ordering::Relaxed);
        let was_pending = self.pending.swap(true, Ordering::AcqRel);
        if was_pending {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!("Tick coalesced with pending tick");
        }
        self.notify.notify_waiters();
        !was_pending
    }

    pub fn is_set(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Lower the flag after the pending tick has been consumed
    pub fn clear(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Wait until a tick is pending. Does not clear it.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent `set` is not missed
            notified.as_mut().enable();

            if self.is_set() {
                return;
            }
            notified.await;
        }
    }

    /// Total number of `set` calls
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Number of `set` calls absorbed by an already pending tick
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}
