//! In-memory site store (no persistence)
//!
//! This backend keeps sites and samples in maps behind an async RwLock.
//! It's useful for:
//! - Testing without database dependencies
//! - Storage-less runs (all data lost on restart)
//!
//! It enforces the same invariants as the SQLite store: unique slugs,
//! atomic sample batches, cascade on site deletion.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{CHART_POINT_CAP, HealthStatus, SiteStore};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricKind, MetricSample};
use crate::{EdgeSite, NewSite, SiteStatus, is_valid_slug, quantity};

#[derive(Default)]
struct Inner {
    sites: HashMap<i64, EdgeSite>,
    samples: HashMap<i64, Vec<MetricSample>>,
    next_id: i64,
}

/// In-memory store
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteStore for MemoryStore {
    async fn insert_site(&self, site: NewSite) -> StorageResult<EdgeSite> {
        let slug = site.resolved_slug();
        if !is_valid_slug(&slug) {
            return Err(StorageError::InvalidSlug(slug));
        }

        let mut inner = self.inner.write().await;
        if inner.sites.values().any(|s| s.slug == slug) {
            return Err(StorageError::DuplicateSlug(slug));
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let site = EdgeSite {
            id,
            name: site.name,
            slug,
            api_endpoint: site.api_endpoint,
            api_token: site.api_token,
            namespace: site.namespace,
            region: site.region,
            environment: site.environment,
            status: SiteStatus::Unknown,
            last_seen_at: None,
        };

        inner.sites.insert(id, site.clone());
        Ok(site)
    }

    async fn site(&self, id: i64) -> StorageResult<EdgeSite> {
        self.inner
            .read()
            .await
            .sites
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("site {id}")))
    }

    async fn site_by_slug(&self, slug: &str) -> StorageResult<EdgeSite> {
        self.inner
            .read()
            .await
            .sites
            .values()
            .find(|s| s.slug == slug)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("site {slug}")))
    }

    async fn active_sites(&self) -> StorageResult<Vec<EdgeSite>> {
        let mut sites: Vec<EdgeSite> = self
            .inner
            .read()
            .await
            .sites
            .values()
            .filter(|s| !s.status.is_offline())
            .cloned()
            .collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sites)
    }

    async fn update_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(site) = inner.sites.get_mut(&site_id) {
            site.status = status;
            site.last_seen_at = last_seen_at;
        }
        Ok(())
    }

    async fn update_site(&self, site: &EdgeSite) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .sites
            .get_mut(&site.id)
            .ok_or_else(|| StorageError::NotFound(format!("site {}", site.id)))?;

        stored.name = site.name.clone();
        stored.api_endpoint = site.api_endpoint.clone();
        stored.api_token = site.api_token.clone();
        stored.namespace = site.namespace.clone();
        stored.region = site.region.clone();
        stored.environment = site.environment.clone();
        Ok(())
    }

    async fn insert_samples(&self, samples: Vec<MetricSample>) -> StorageResult<()> {
        if samples.is_empty() {
            return Ok(());
        }

        // All-or-nothing, like the transactional backend.
        for sample in &samples {
            sample.validate()?;
        }

        let mut inner = self.inner.write().await;
        for sample in samples {
            inner.samples.entry(sample.site_id).or_default().push(sample);
        }
        Ok(())
    }

    async fn samples_by_kind(
        &self,
        site_id: i64,
        kind: MetricKind,
    ) -> StorageResult<Vec<(DateTime<Utc>, f64)>> {
        let inner = self.inner.read().await;
        let mut points: Vec<(DateTime<Utc>, f64)> = inner
            .samples
            .get(&site_id)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.kind == kind)
                    .map(|s| (s.recorded_at, s.value))
                    .collect()
            })
            .unwrap_or_default();

        points.sort_by_key(|(recorded_at, _)| *recorded_at);
        if points.len() > CHART_POINT_CAP {
            points.drain(..points.len() - CHART_POINT_CAP);
        }
        Ok(points)
    }

    async fn latest_by_kind(
        &self,
        site_id: i64,
        kind: MetricKind,
    ) -> StorageResult<Option<MetricSample>> {
        let inner = self.inner.read().await;
        Ok(inner.samples.get(&site_id).and_then(|samples| {
            samples
                .iter()
                .filter(|s| s.kind == kind)
                .max_by_key(|s| s.recorded_at)
                .cloned()
        }))
    }

    async fn average_over(
        &self,
        site_id: i64,
        kind: MetricKind,
        window: Duration,
    ) -> StorageResult<Option<f64>> {
        let cutoff = Utc::now() - window;
        let inner = self.inner.read().await;

        let values: Vec<f64> = inner
            .samples
            .get(&site_id)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.kind == kind && s.recorded_at >= cutoff)
                    .map(|s| s.value)
                    .collect()
            })
            .unwrap_or_default();

        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(quantity::round2(
            values.iter().sum::<f64>() / values.len() as f64,
        )))
    }

    async fn delete_site(&self, site_id: i64) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if inner.sites.remove(&site_id).is_none() {
            return Err(StorageError::NotFound(format!("site {site_id}")));
        }
        inner.samples.remove(&site_id);
        Ok(())
    }

    async fn cleanup_old_samples(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut inner = self.inner.write().await;
        let mut deleted = 0;
        for samples in inner.samples.values_mut() {
            let len_before = samples.len();
            samples.retain(|s| s.recorded_at >= before);
            deleted += len_before - samples.len();
        }
        Ok(deleted)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let inner = self.inner.read().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory store operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("sites".to_string(), inner.sites.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
