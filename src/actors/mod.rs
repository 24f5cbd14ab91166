//! Actor-based polling scheduler
//!
//! Each monitored site gets its own async task ("poller") that runs
//! collection passes on a fixed cadence and communicates via Tokio
//! channels. A fleet sweep keeps the set of pollers in step with the set
//! of registered sites.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │   Hub (main)    │
//!                  └────────┬────────┘
//!                           │ runs
//!                  ┌────────▼────────┐
//!                  │   FleetSweep    │  enumerates active sites
//!                  └────────┬────────┘
//!                           │ spawns / prunes
//!            ┌──────────────┼──────────────┐
//!            │              │              │
//!    ┌───────▼───────┐      │      ┌───────▼───────┐
//!    │ SitePoller-1  │      │      │ SitePoller-N  │
//!    │ (site A)      │      │      │ (site N)      │
//!    └───────┬───────┘      │      └───────┬───────┘
//!            │ collection passes           │
//!            └──────────────┬──────────────┘
//!                           │ publish
//!                 ┌─────────▼──────────┐
//!                 │ Broadcast Channel  │ (SiteEvent)
//!                 └─────────┬──────────┘
//!                           │ subscribe
//!              external consumers (push channel, alerting)
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each poller has an mpsc command channel (PollNow,
//!    UpdateInterval, Shutdown)
//! 2. **Events**: Passes publish `SiteEvent`s to a broadcast channel for
//!    fan-out to any number of consumers
//! 3. **Request/Response**: oneshot channels carry PollNow results back

pub mod messages;
pub mod poller;
pub mod sweep;

pub use messages::{PollerCommand, SiteEvent};
pub use poller::{DEFAULT_POLL_INTERVAL, PollerHandle, SitePollerActor};
pub use sweep::{DEFAULT_SWEEP_INTERVAL, FleetSweep};
