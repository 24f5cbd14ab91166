//! Metrics collection passes
//!
//! One pass polls a single site, normalizes whatever metrics its access
//! mode allows into [`MetricSample`]s, persists them as one atomic batch,
//! derives the site's status from the fresh values, and emits a
//! [`SiteEvent`] for real-time consumers.
//!
//! Failure semantics are deliberately lopsided: every fetch and the
//! persistence step fail *into the pass result* (an error string is
//! accumulated and the pass continues), while a connection-setup failure
//! aborts the pass with [`ClusterError::Configuration`] so the scheduler
//! can retry it.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, instrument, trace, warn};

use crate::actors::messages::SiteEvent;
use crate::cluster::{ApiClient, ClientFactory, ClusterError};
use crate::quantity::{
    ASSUMED_NODE_CORES, ASSUMED_NODE_MEMORY_BYTES, cpu_percent, memory_percent, parse_cpu,
    parse_memory, round2,
};
use crate::storage::{MetricKind, MetricSample, SiteStore, StorageError};
use crate::{AccessMode, EdgeSite, SiteStatus};

/// CPU average below this is healthy (full-access derivation)
const CPU_HEALTHY_BELOW: f64 = 70.0;

/// CPU average below this is degraded, at or above it critical
const CPU_DEGRADED_BELOW: f64 = 85.0;

/// Restricted derivation: running/total ratio at or above this is degraded
/// rather than critical
const RUNNING_RATIO_FLOOR: f64 = 0.7;

/// Result of one collection pass
///
/// `success` is about collection completeness, independent of the derived
/// health status: a site can be critical with `success: true` when every
/// fetch worked.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub success: bool,
    pub samples: Vec<MetricSample>,
    pub errors: Vec<String>,
}

/// Errors that affect scheduling of a collection pass
///
/// Everything else ends up inside [`CollectionOutcome::errors`].
#[derive(Debug, Clone)]
pub enum CollectError {
    /// The target site no longer exists: discard, do not retry
    NotFound(String),

    /// Connection setup failed: retry a bounded number of times
    Configuration(String),

    /// The store failed while loading the site
    Storage(String),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::NotFound(what) => write!(f, "site not found: {}", what),
            CollectError::Configuration(msg) => {
                write!(f, "unable to connect to cluster: {}", msg)
            }
            CollectError::Storage(msg) => write!(f, "storage failure: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<StorageError> for CollectError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => CollectError::NotFound(what),
            other => CollectError::Storage(other.to_string()),
        }
    }
}

impl From<ClusterError> for CollectError {
    fn from(err: ClusterError) -> Self {
        // only configuration errors escape a pass
        CollectError::Configuration(err.to_string())
    }
}

/// Load a site by id and run one collection pass for it.
///
/// This is the entry point shared by the scheduler and the on-demand
/// "collect now" trigger.
pub async fn collect_site(
    store: &dyn SiteStore,
    events: &broadcast::Sender<SiteEvent>,
    site_id: i64,
) -> Result<CollectionOutcome, CollectError> {
    let site = store.site(site_id).await?;
    let outcome = MetricsCollector::new(&site, store, events).collect().await?;
    Ok(outcome)
}

/// Runs one collection pass for one site
pub struct MetricsCollector<'a> {
    site: &'a EdgeSite,
    store: &'a dyn SiteStore,
    events: &'a broadcast::Sender<SiteEvent>,
}

impl<'a> MetricsCollector<'a> {
    pub fn new(
        site: &'a EdgeSite,
        store: &'a dyn SiteStore,
        events: &'a broadcast::Sender<SiteEvent>,
    ) -> Self {
        Self {
            site,
            store,
            events,
        }
    }

    /// Run one pass.
    ///
    /// The only error this returns is [`ClusterError::Configuration`];
    /// every other failure is accumulated into the outcome.
    #[instrument(skip(self), fields(site = %self.site.slug))]
    pub async fn collect(&self) -> Result<CollectionOutcome, ClusterError> {
        // one timestamp for every sample in the pass
        let recorded_at = Utc::now();

        let mut samples = Vec::new();
        let mut errors = Vec::new();

        let factory = ClientFactory::new(self.site);

        match self.site.access_mode() {
            AccessMode::Restricted { namespace } => {
                let core = factory.core()?;
                let metrics = factory.metrics()?;

                collect_namespace_pods(
                    &core,
                    self.site.id,
                    namespace,
                    recorded_at,
                    &mut samples,
                    &mut errors,
                )
                .await;
                collect_namespace_pod_metrics(
                    &metrics,
                    self.site.id,
                    namespace,
                    recorded_at,
                    &mut samples,
                    &mut errors,
                )
                .await;
            }
            AccessMode::Full => {
                let metrics = factory.metrics()?;

                collect_node_metrics(&metrics, self.site.id, recorded_at, &mut samples, &mut errors)
                    .await;
                collect_pod_count(&metrics, self.site.id, recorded_at, &mut samples, &mut errors)
                    .await;
            }
        }

        if !samples.is_empty() {
            if let Err(e) = self.store.insert_samples(samples.clone()).await {
                warn!("failed to persist samples: {e}");
                errors.push(format!("Failed to persist samples: {e}"));
            }
        }

        let status = derive_status(self.site.access_mode(), &samples, &errors);
        let last_seen_at = if status.is_offline() {
            // unreachable this pass
            None
        } else {
            Some(recorded_at)
        };

        if let Err(e) = self
            .store
            .update_site_status(self.site.id, status, last_seen_at)
            .await
        {
            warn!("failed to update site status: {e}");
            errors.push(format!("Failed to update site status: {e}"));
        }

        self.notify(status, last_seen_at, recorded_at);

        debug!(
            "pass complete: {} samples, {} errors, status {status}",
            samples.len(),
            errors.len()
        );

        Ok(CollectionOutcome {
            success: errors.is_empty(),
            samples,
            errors,
        })
    }

    /// Best-effort event for real-time consumers. A missing or slow
    /// subscriber must never fail the pass.
    fn notify(
        &self,
        status: SiteStatus,
        last_seen_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    ) {
        let event = SiteEvent {
            site_id: self.site.id,
            slug: self.site.slug.clone(),
            status,
            last_seen_at,
            timestamp,
        };

        match self.events.send(event) {
            Ok(receivers) => trace!("published site event to {receivers} receivers"),
            Err(_) => trace!("no receivers for site event (this is OK)"),
        }
    }
}

async fn collect_namespace_pods(
    core: &ApiClient,
    site_id: i64,
    namespace: &str,
    recorded_at: DateTime<Utc>,
    samples: &mut Vec<MetricSample>,
    errors: &mut Vec<String>,
) {
    match core.list_pods(namespace).await {
        Ok(pods) => {
            let total = pods.items.len();
            let running = pods.items.iter().filter(|p| p.is_running()).count();

            samples.push(
                MetricSample::new(site_id, MetricKind::PodCount, total as f64, "count", recorded_at)
                    .with_namespace(namespace),
            );
            samples.push(
                MetricSample::new(
                    site_id,
                    MetricKind::RunningPods,
                    running as f64,
                    "count",
                    recorded_at,
                )
                .with_namespace(namespace),
            );
        }
        Err(e) => errors.push(format!("Pod list unavailable: {e}")),
    }
}

async fn collect_namespace_pod_metrics(
    metrics: &ApiClient,
    site_id: i64,
    namespace: &str,
    recorded_at: DateTime<Utc>,
    samples: &mut Vec<MetricSample>,
    errors: &mut Vec<String>,
) {
    // may not be served at all in a sandboxed namespace
    match metrics.pod_metrics_in(namespace).await {
        Ok(pod_metrics) => {
            for pod in &pod_metrics.items {
                for container in &pod.containers {
                    let cpu_nano = parse_cpu(container.cpu());
                    let memory_bytes = parse_memory(container.memory());

                    samples.push(
                        MetricSample::new(
                            site_id,
                            MetricKind::CpuMillicores,
                            round2(cpu_nano as f64 / 1_000_000.0),
                            "millicores",
                            recorded_at,
                        )
                        .with_pod(pod.metadata.name())
                        .with_namespace(namespace)
                        .with_label("container", &container.name),
                    );
                    samples.push(
                        MetricSample::new(
                            site_id,
                            MetricKind::MemoryMb,
                            round2(memory_bytes as f64 / (1024.0 * 1024.0)),
                            "MB",
                            recorded_at,
                        )
                        .with_pod(pod.metadata.name())
                        .with_namespace(namespace)
                        .with_label("container", &container.name),
                    );
                }
            }
        }
        Err(e) => errors.push(format!("Pod metrics API unavailable: {e}")),
    }
}

async fn collect_node_metrics(
    metrics: &ApiClient,
    site_id: i64,
    recorded_at: DateTime<Utc>,
    samples: &mut Vec<MetricSample>,
    errors: &mut Vec<String>,
) {
    match metrics.node_metrics().await {
        Ok(node_metrics) => {
            for node in &node_metrics.items {
                let cpu_nano = parse_cpu(node.cpu());
                let memory_bytes = parse_memory(node.memory());

                samples.push(
                    MetricSample::new(
                        site_id,
                        MetricKind::CpuPercent,
                        cpu_percent(cpu_nano, ASSUMED_NODE_CORES),
                        "percent",
                        recorded_at,
                    )
                    .with_node(node.metadata.name()),
                );
                samples.push(
                    MetricSample::new(
                        site_id,
                        MetricKind::MemoryPercent,
                        memory_percent(memory_bytes, ASSUMED_NODE_MEMORY_BYTES),
                        "percent",
                        recorded_at,
                    )
                    .with_node(node.metadata.name()),
                );
            }
        }
        Err(e) => errors.push(format!("Node metrics unavailable: {e}")),
    }
}

async fn collect_pod_count(
    metrics: &ApiClient,
    site_id: i64,
    recorded_at: DateTime<Utc>,
    samples: &mut Vec<MetricSample>,
    errors: &mut Vec<String>,
) {
    match metrics.pod_metrics().await {
        Ok(pods) => {
            samples.push(MetricSample::new(
                site_id,
                MetricKind::PodCount,
                pods.items.len() as f64,
                "count",
                recorded_at,
            ));
        }
        Err(e) => errors.push(format!("Pod metrics unavailable: {e}")),
    }
}

/// Derive the site status from one pass's samples and errors.
///
/// Zero samples with at least one error means the site was unreachable
/// this pass. Otherwise restricted sites are judged on their running/total
/// pod ratio and full-access sites on their average node CPU.
pub(crate) fn derive_status(
    mode: AccessMode<'_>,
    samples: &[MetricSample],
    errors: &[String],
) -> SiteStatus {
    if samples.is_empty() && !errors.is_empty() {
        return SiteStatus::Offline;
    }

    match mode {
        AccessMode::Restricted { .. } => {
            let pod_count = sample_value(samples, MetricKind::PodCount).unwrap_or(0.0);
            let running = sample_value(samples, MetricKind::RunningPods).unwrap_or(0.0);

            if pod_count == 0.0 {
                // an empty namespace is normal
                SiteStatus::Healthy
            } else if running == pod_count {
                SiteStatus::Healthy
            } else if running >= pod_count * RUNNING_RATIO_FLOOR {
                SiteStatus::Degraded
            } else {
                SiteStatus::Critical
            }
        }
        AccessMode::Full => {
            let cpu_values: Vec<f64> = samples
                .iter()
                .filter(|s| s.kind == MetricKind::CpuPercent)
                .map(|s| s.value)
                .collect();

            let cpu_avg = if cpu_values.is_empty() {
                0.0
            } else {
                cpu_values.iter().sum::<f64>() / cpu_values.len() as f64
            };

            if cpu_avg < CPU_HEALTHY_BELOW {
                SiteStatus::Healthy
            } else if cpu_avg < CPU_DEGRADED_BELOW {
                SiteStatus::Degraded
            } else {
                SiteStatus::Critical
            }
        }
    }
}

fn sample_value(samples: &[MetricSample], kind: MetricKind) -> Option<f64> {
    samples.iter().find(|s| s.kind == kind).map(|s| s.value)
}
