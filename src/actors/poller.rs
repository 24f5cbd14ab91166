//! SitePollerActor - drives periodic collection passes for one site
//!
//! One actor per site, which is what serializes passes: the next tick for
//! a site cannot start until the previous pass finished, so status writes
//! never interleave.
//!
//! ## Failure policy
//!
//! - A configuration error (connection setup) is retried up to a small
//!   fixed attempt count with a fixed delay inside the pass, then given up
//!   for that invocation. The next tick starts over.
//! - A deleted site permanently discards the poller: the actor exits and
//!   the fleet sweep prunes its handle. No retry, no error surfaced.
//! - Everything else already ended up inside the pass result.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → load site → collection pass → samples + status + SiteEvent
//!     ↑
//!     └─── Commands (PollNow, UpdateInterval, Shutdown)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

use super::messages::{PollerCommand, SiteEvent};
use crate::collector::{CollectError, CollectionOutcome, collect_site};
use crate::storage::SiteStore;

/// Default cadence between collection passes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How often a configuration error is retried within one invocation
const RETRY_ATTEMPTS: usize = 3;

/// Delay between configuration-error retries
const RETRY_DELAY: Duration = Duration::from_secs(30);

/// What a finished pass means for the actor's lifetime
enum PassDisposition {
    /// Keep polling on the next tick
    Continue,

    /// The site is gone, stop polling it forever
    Discard,
}

/// Actor that polls a single site on a fixed cadence
pub struct SitePollerActor {
    site_id: i64,
    store: Arc<dyn SiteStore>,
    events: broadcast::Sender<SiteEvent>,
    command_rx: mpsc::Receiver<PollerCommand>,
    interval_duration: Duration,
    retry_delay: Duration,
}

impl SitePollerActor {
    fn new(
        site_id: i64,
        store: Arc<dyn SiteStore>,
        events: broadcast::Sender<SiteEvent>,
        command_rx: mpsc::Receiver<PollerCommand>,
        interval_duration: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            site_id,
            store,
            events,
            command_rx,
            interval_duration,
            retry_delay,
        }
    }

    /// Run the actor's main loop
    ///
    /// Exits when a Shutdown command arrives, the command channel closes,
    /// or the target site has been deleted.
    #[instrument(skip(self), fields(site_id = self.site_id))]
    pub async fn run(mut self) {
        debug!("starting site poller");

        // the first tick fires immediately, which doubles as the initial
        // collection after registration
        let mut ticker = interval(self.interval_duration);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let PassDisposition::Discard = self.run_pass().await {
                        break;
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PollerCommand::PollNow { respond_to } => {
                            debug!("received PollNow command");
                            // single attempt: on-demand callers want the
                            // immediate answer, not the retry budget
                            let result =
                                collect_site(self.store.as_ref(), &self.events, self.site_id)
                                    .await;
                            let discard = matches!(result, Err(CollectError::NotFound(_)));
                            let _ = respond_to.send(result);
                            if discard {
                                info!("site no longer exists, discarding poller");
                                break;
                            }
                        }

                        PollerCommand::UpdateInterval { interval_secs } => {
                            debug!("updating interval to {interval_secs}s");
                            self.interval_duration = Duration::from_secs(interval_secs);
                            ticker = interval(self.interval_duration);
                        }

                        PollerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("site poller stopped");
    }

    /// One scheduled invocation, including the configuration retry budget.
    async fn run_pass(&self) -> PassDisposition {
        for attempt in 1..=RETRY_ATTEMPTS {
            match collect_site(self.store.as_ref(), &self.events, self.site_id).await {
                Ok(outcome) => {
                    if outcome.success {
                        debug!("collected {} samples", outcome.samples.len());
                    } else {
                        warn!(
                            "partial failure ({} samples): {}",
                            outcome.samples.len(),
                            outcome.errors.join(", ")
                        );
                    }
                    return PassDisposition::Continue;
                }

                Err(CollectError::NotFound(_)) => {
                    info!("site no longer exists, discarding poller");
                    return PassDisposition::Discard;
                }

                Err(CollectError::Configuration(msg)) => {
                    warn!("configuration error (attempt {attempt}/{RETRY_ATTEMPTS}): {msg}");
                    if attempt < RETRY_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }

                Err(CollectError::Storage(msg)) => {
                    error!("storage failure during pass: {msg}");
                    return PassDisposition::Continue;
                }
            }
        }

        error!("giving up after {RETRY_ATTEMPTS} configuration failures");
        PassDisposition::Continue
    }
}

/// Handle for controlling a SitePollerActor
///
/// Can be cloned and shared across tasks.
#[derive(Clone)]
pub struct PollerHandle {
    sender: mpsc::Sender<PollerCommand>,

    /// Target site
    pub site_id: i64,
}

impl PollerHandle {
    /// Spawn a poller with the default cadence and retry delay.
    pub fn spawn(
        site_id: i64,
        store: Arc<dyn SiteStore>,
        events: broadcast::Sender<SiteEvent>,
    ) -> Self {
        Self::spawn_with(site_id, store, events, DEFAULT_POLL_INTERVAL, RETRY_DELAY)
    }

    /// Spawn a poller with explicit timings.
    pub fn spawn_with(
        site_id: i64,
        store: Arc<dyn SiteStore>,
        events: broadcast::Sender<SiteEvent>,
        poll_interval: Duration,
        retry_delay: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor =
            SitePollerActor::new(site_id, store, events, cmd_rx, poll_interval, retry_delay);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            site_id,
        }
    }

    /// Trigger an immediate collection pass, bypassing the interval timer.
    pub async fn poll_now(&self) -> Result<CollectionOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(PollerCommand::PollNow { respond_to: tx })
            .await
            .context("failed to send PollNow command")?;

        let outcome = rx.await.context("failed to receive response")??;
        Ok(outcome)
    }

    /// Update the polling interval.
    pub async fn update_interval(&self, interval_secs: u64) -> Result<()> {
        self.sender
            .send(PollerCommand::UpdateInterval { interval_secs })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    /// Gracefully shut down the poller.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PollerCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }

    /// Whether the actor has exited (shut down or discarded its site).
    pub fn is_finished(&self) -> bool {
        self.sender.is_closed()
    }
}
