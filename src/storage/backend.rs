//! Storage trait definition
//!
//! This module defines the core `SiteStore` trait that all storage
//! implementations must implement.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::error::StorageResult;
use super::schema::{MetricKind, MetricSample};
use crate::{EdgeSite, NewSite, SiteStatus};

/// Chart queries return at most this many points, ascending in time.
pub const CHART_POINT_CAP: usize = 60;

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for site and sample persistence
///
/// All storage backends must implement this trait. The trait is designed
/// to be:
///
/// - **Async**: All methods are async for compatibility with Tokio
/// - **Batch-oriented**: `insert_samples` writes one pass atomically
/// - **Queryable**: chart/window queries for the read surface
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across the
/// per-site poll tasks.
///
/// ## Invariants enforced here
///
/// - Slugs are unique and immutable: `insert_site` rejects duplicates and
///   no method updates a slug.
/// - Deleting a site cascades to its samples.
/// - A sample batch either commits completely or not at all.
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Register a new site.
    ///
    /// Resolves the slug (deriving it from the name when absent),
    /// validates its shape, and enforces uniqueness.
    async fn insert_site(&self, site: NewSite) -> StorageResult<EdgeSite>;

    /// Load a site by id. `NotFound` when it does not exist.
    async fn site(&self, id: i64) -> StorageResult<EdgeSite>;

    /// Load a site by slug. `NotFound` when it does not exist.
    async fn site_by_slug(&self, slug: &str) -> StorageResult<EdgeSite>;

    /// All sites that are not offline, ordered by name.
    ///
    /// This is the fleet-sweep enumeration.
    async fn active_sites(&self) -> StorageResult<Vec<EdgeSite>>;

    /// Write the derived status and last-seen stamp for a site.
    ///
    /// The only mutation path for these fields outside administrative
    /// edits. Passing `None` clears `last_seen_at` (unreachable site).
    async fn update_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()>;

    /// Administrative edit of a site's connection fields.
    ///
    /// Updates name, endpoint, credential, namespace, region, and
    /// environment. The slug is immutable and the status/last-seen pair
    /// is only ever written through `update_site_status`.
    async fn update_site(&self, site: &EdgeSite) -> StorageResult<()>;

    /// Insert one pass's samples as a single atomic batch.
    ///
    /// Validation failure of any sample rejects the whole batch.
    async fn insert_samples(&self, samples: Vec<MetricSample>) -> StorageResult<()>;

    /// Chart surface: the [`CHART_POINT_CAP`] most recent points of one
    /// kind for one site, ascending in time.
    async fn samples_by_kind(
        &self,
        site_id: i64,
        kind: MetricKind,
    ) -> StorageResult<Vec<(DateTime<Utc>, f64)>>;

    /// The most recent sample of one kind for one site.
    async fn latest_by_kind(
        &self,
        site_id: i64,
        kind: MetricKind,
    ) -> StorageResult<Option<MetricSample>>;

    /// Average value of one kind over a trailing window, rounded to 2
    /// decimals. `None` when the window holds no samples.
    async fn average_over(
        &self,
        site_id: i64,
        kind: MetricKind,
        window: Duration,
    ) -> StorageResult<Option<f64>>;

    /// Remove a site and, by cascade, all of its samples.
    async fn delete_site(&self, site_id: i64) -> StorageResult<()>;

    /// Delete samples older than the given timestamp.
    ///
    /// Used for retention policy enforcement. Returns the number of
    /// samples deleted.
    async fn cleanup_old_samples(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    /// Check backend health with a lightweight operation.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources.
    async fn close(&self) -> StorageResult<()>;
}
