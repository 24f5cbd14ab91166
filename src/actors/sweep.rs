//! Fleet-wide sweep
//!
//! The sweep is the only component allowed to fan out over the whole
//! fleet: it periodically enumerates every non-offline site and makes
//! sure exactly one poller is running for it. Newly registered sites get
//! their poller (whose first tick fires immediately) on the next sweep;
//! pollers whose site was deleted have already exited and are pruned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

use super::messages::SiteEvent;
use super::poller::PollerHandle;
use crate::storage::{SiteStore, StorageResult};

/// Default cadence between fleet sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Keeps one poller per active site
pub struct FleetSweep {
    store: Arc<dyn SiteStore>,
    events: broadcast::Sender<SiteEvent>,
    poll_interval: Duration,
    pollers: HashMap<i64, PollerHandle>,
}

impl FleetSweep {
    pub fn new(
        store: Arc<dyn SiteStore>,
        events: broadcast::Sender<SiteEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            events,
            poll_interval,
            pollers: HashMap::new(),
        }
    }

    /// One sweep: prune finished pollers, spawn missing ones.
    ///
    /// Returns how many pollers were spawned.
    #[instrument(skip(self))]
    pub async fn sweep_once(&mut self) -> StorageResult<usize> {
        self.pollers.retain(|site_id, handle| {
            let alive = !handle.is_finished();
            if !alive {
                debug!("pruning finished poller for site {site_id}");
            }
            alive
        });

        let sites = self.store.active_sites().await?;
        let mut spawned = 0;

        for site in sites {
            if !self.pollers.contains_key(&site.id) {
                debug!("spawning poller for {}", site.slug);
                let handle = PollerHandle::spawn_with(
                    site.id,
                    self.store.clone(),
                    self.events.clone(),
                    self.poll_interval,
                    Duration::from_secs(30),
                );
                self.pollers.insert(site.id, handle);
                spawned += 1;
            }
        }

        trace!("sweep complete: {} pollers running", self.pollers.len());
        Ok(spawned)
    }

    /// Run sweeps forever on the given cadence.
    pub async fn run(mut self, sweep_interval: Duration) {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                tracing::error!("fleet sweep failed: {e}");
            }
        }
    }

    /// Handle for one site's poller, if it is running.
    pub fn poller(&self, site_id: i64) -> Option<&PollerHandle> {
        self.pollers.get(&site_id)
    }

    /// Number of live pollers.
    pub fn poller_count(&self) -> usize {
        self.pollers.len()
    }

    /// Shut down every poller.
    pub async fn shutdown(&mut self) {
        for handle in self.pollers.values() {
            let _ = handle.shutdown().await;
        }
        self.pollers.clear();
    }
}
