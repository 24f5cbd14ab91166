//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Events**: Broadcast notifications published to multiple subscribers
//! 3. **Immutability**: All messages are cloneable for multi-subscriber patterns

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::SiteStatus;
use crate::collector::{CollectError, CollectionOutcome};

/// Event published after each collection pass updates a site
///
/// This is the outbound real-time boundary: consumers (a push channel, an
/// alerting collaborator) subscribe to the broadcast channel. The channel
/// may lag or drop events for slow subscribers, which is acceptable since
/// the next pass publishes a fresh one.
#[derive(Debug, Clone, Serialize)]
pub struct SiteEvent {
    pub site_id: i64,
    pub slug: String,
    pub status: SiteStatus,
    pub last_seen_at: Option<DateTime<Utc>>,

    /// When the pass that produced this event ran
    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to a SitePollerActor
#[derive(Debug)]
pub enum PollerCommand {
    /// Run a collection pass immediately (bypassing the interval timer)
    ///
    /// Used for the on-demand "collect now" trigger and for tests. Runs a
    /// single attempt, without the configuration-error retry budget.
    PollNow {
        /// Channel to send the result back
        respond_to: oneshot::Sender<Result<CollectionOutcome, CollectError>>,
    },

    /// Update the polling interval
    ///
    /// The new interval takes effect immediately.
    UpdateInterval {
        /// New interval in seconds
        interval_secs: u64,
    },

    /// Gracefully shut down the poller
    ///
    /// The actor finishes any in-flight pass and then exits.
    Shutdown,
}
