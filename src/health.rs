//! Capability-aware health checks
//!
//! A check runs a small set of independent probes against a site's APIs
//! and folds them into one of four states by a fixed precedence rule.
//! Which probes run depends on the site's [`AccessMode`]:
//!
//! - restricted: `api_reachable`, `pods_healthy`, `deployments_ready`
//! - full access: `api_reachable`, `nodes_ready`, `metrics_available`
//!
//! Every probe catches its own transport errors and reports `ok: false`
//! instead of propagating, so one unreachable sub-API never aborts the
//! other probes. Checks are read-only: nothing is persisted.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::cluster::{ApiClient, ClientFactory, ClusterError};
use crate::storage::{SiteStore, StorageResult};
use crate::{AccessMode, EdgeSite, SiteStatus};

pub const API_REACHABLE: &str = "api_reachable";
pub const PODS_HEALTHY: &str = "pods_healthy";
pub const DEPLOYMENTS_READY: &str = "deployments_ready";
pub const NODES_READY: &str = "nodes_ready";
pub const METRICS_AVAILABLE: &str = "metrics_available";

/// Detail key used when the connection could not even be built
pub const CONFIG_ERROR: &str = "error";

/// Outcome of a single probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub message: String,

    /// How many objects the probe considered, where that makes sense
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,

    /// How many of them were in the desired state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<usize>,
}

impl ProbeOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            total: None,
            ready: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            total: None,
            ready: None,
        }
    }
}

/// Immutable result of one health check pass
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub status: SiteStatus,

    /// Raw per-probe details, for diagnostics and UI only
    pub details: BTreeMap<&'static str, ProbeOutcome>,
}

/// Runs one health check pass for one site
pub struct HealthChecker<'a> {
    site: &'a EdgeSite,
    factory: ClientFactory,
}

impl<'a> HealthChecker<'a> {
    pub fn new(site: &'a EdgeSite) -> Self {
        Self {
            site,
            factory: ClientFactory::new(site),
        }
    }

    /// Run the probe set for the site's access mode and fold the results.
    ///
    /// A configuration error while building the connection short-circuits
    /// the whole check to offline.
    #[instrument(skip(self), fields(site = %self.site.slug))]
    pub async fn check(&self) -> HealthReport {
        // fetch errors are swallowed inside the probes, so an error here
        // means the connection could not even be built
        let details = match self.run_probes().await {
            Ok(details) => details,
            Err(e) => {
                debug!("connection setup failed: {e}");
                let mut details = BTreeMap::new();
                details.insert(CONFIG_ERROR, ProbeOutcome::fail(e.to_string()));
                return HealthReport {
                    healthy: false,
                    status: SiteStatus::Offline,
                    details,
                };
            }
        };

        let healthy = details.values().all(|probe| probe.ok);
        let status = derive_probe_status(&details);
        debug!("health check complete: {status}");

        HealthReport {
            healthy,
            status,
            details,
        }
    }

    async fn run_probes(
        &self,
    ) -> Result<BTreeMap<&'static str, ProbeOutcome>, ClusterError> {
        let core = self.factory.core()?;
        let mut details = BTreeMap::new();

        match self.site.access_mode() {
            AccessMode::Restricted { namespace } => {
                let apps = self.factory.apps()?;
                details.insert(API_REACHABLE, check_api(&core).await);
                details.insert(PODS_HEALTHY, check_pods(&core, namespace).await);
                details.insert(DEPLOYMENTS_READY, check_deployments(&apps, namespace).await);
            }
            AccessMode::Full => {
                let metrics = self.factory.metrics()?;
                details.insert(API_REACHABLE, check_api(&core).await);
                details.insert(NODES_READY, check_nodes(&core).await);
                details.insert(METRICS_AVAILABLE, check_metrics(&metrics).await);
            }
        }

        Ok(details)
    }
}

/// Load a site and run a health check for it.
pub async fn check_site(store: &dyn SiteStore, site_id: i64) -> StorageResult<HealthReport> {
    let site = store.site(site_id).await?;
    Ok(HealthChecker::new(&site).check().await)
}

async fn check_api(core: &ApiClient) -> ProbeOutcome {
    match core.ping().await {
        Ok(()) => ProbeOutcome::ok("API server responding"),
        Err(e) => ProbeOutcome::fail(format!("API unreachable: {e}")),
    }
}

async fn check_pods(core: &ApiClient, namespace: &str) -> ProbeOutcome {
    match core.list_pods(namespace).await {
        Ok(pods) => {
            let total = pods.items.len();
            let running = pods.items.iter().filter(|p| p.is_running()).count();

            // an empty namespace is fine; with pods present at least one
            // must be running
            ProbeOutcome {
                ok: total == 0 || running > 0,
                message: format!("{running}/{total} pods running"),
                total: Some(total),
                ready: Some(running),
            }
        }
        Err(e) => ProbeOutcome::fail(format!("Failed to check pods: {e}")),
    }
}

async fn check_deployments(apps: &ApiClient, namespace: &str) -> ProbeOutcome {
    match apps.list_deployments(namespace).await {
        Ok(deployments) => {
            let considered = deployments.items.iter().filter(|d| d.desired() > 0).count();
            let ready = deployments
                .items
                .iter()
                .filter(|d| d.desired() > 0 && d.available() >= d.desired())
                .count();

            ProbeOutcome {
                ok: deployments.items.iter().all(|d| d.is_satisfied()),
                message: format!("{ready}/{considered} deployments ready"),
                total: Some(considered),
                ready: Some(ready),
            }
        }
        Err(e) => ProbeOutcome::fail(format!("Failed to check deployments: {e}")),
    }
}

async fn check_nodes(core: &ApiClient) -> ProbeOutcome {
    match core.list_nodes().await {
        Ok(nodes) => {
            let total = nodes.items.len();
            let ready = nodes.items.iter().filter(|n| n.is_ready()).count();

            ProbeOutcome {
                ok: ready == total && total > 0,
                message: format!("{ready}/{total} nodes ready"),
                total: Some(total),
                ready: Some(ready),
            }
        }
        Err(e) => ProbeOutcome::fail(format!("Failed to check nodes: {e}")),
    }
}

async fn check_metrics(metrics: &ApiClient) -> ProbeOutcome {
    match metrics.node_metrics().await {
        Ok(_) => ProbeOutcome::ok("Metrics server available"),
        Err(e) => ProbeOutcome::fail(format!("Metrics unavailable: {e}")),
    }
}

/// Fold probe outcomes into a status, first match wins:
///
/// 1. `api_reachable` failed → offline
/// 2. `pods_healthy` / `nodes_ready` failed → critical
/// 3. `deployments_ready` / `metrics_available` failed → degraded
/// 4. otherwise → healthy
pub(crate) fn derive_probe_status(details: &BTreeMap<&'static str, ProbeOutcome>) -> SiteStatus {
    let probe_ok = |name: &str| details.get(name).map(|p| p.ok);

    if probe_ok(API_REACHABLE) == Some(false) {
        return SiteStatus::Offline;
    }

    if let Some(nodes_ok) = probe_ok(NODES_READY) {
        if !nodes_ok {
            return SiteStatus::Critical;
        }
        if probe_ok(METRICS_AVAILABLE) == Some(false) {
            return SiteStatus::Degraded;
        }
    } else {
        if probe_ok(PODS_HEALTHY) == Some(false) {
            return SiteStatus::Critical;
        }
        if probe_ok(DEPLOYMENTS_READY) == Some(false) {
            return SiteStatus::Degraded;
        }
    }

    SiteStatus::Healthy
}
