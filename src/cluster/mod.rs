//! Scoped API access to a site's cluster
//!
//! A [`ClientFactory`] turns one [`EdgeSite`](crate::EdgeSite)'s endpoint
//! and credential into short-lived handles scoped per API group (core,
//! metrics, apps). Handles are rebuilt for every check or collection pass.

pub mod client;
pub mod error;
pub mod resources;

pub use client::{ApiClient, ClientFactory};
pub use error::{ClusterError, ClusterResult};
