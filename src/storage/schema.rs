//! Persisted metric sample shape and the closed metric kind set
//!
//! A [`MetricSample`] is one observed value for one site at one point in
//! time. Samples are append-only: created exclusively by the collector,
//! never updated, deleted only by site cascade or retention cleanup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};

/// The closed set of metric types the system records
///
/// Anything outside this set is rejected at the storage boundary; rows
/// read back with an unknown kind surface as a storage error rather than
/// silently coercing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CpuPercent,
    MemoryPercent,
    DiskPercent,
    NetworkRx,
    NetworkTx,
    PodCount,
    NodeCount,
    RunningPods,
    CpuMillicores,
    MemoryMb,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::CpuPercent => "cpu_percent",
            MetricKind::MemoryPercent => "memory_percent",
            MetricKind::DiskPercent => "disk_percent",
            MetricKind::NetworkRx => "network_rx",
            MetricKind::NetworkTx => "network_tx",
            MetricKind::PodCount => "pod_count",
            MetricKind::NodeCount => "node_count",
            MetricKind::RunningPods => "running_pods",
            MetricKind::CpuMillicores => "cpu_millicores",
            MetricKind::MemoryMb => "memory_mb",
        };
        write!(f, "{name}")
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu_percent" => Ok(MetricKind::CpuPercent),
            "memory_percent" => Ok(MetricKind::MemoryPercent),
            "disk_percent" => Ok(MetricKind::DiskPercent),
            "network_rx" => Ok(MetricKind::NetworkRx),
            "network_tx" => Ok(MetricKind::NetworkTx),
            "pod_count" => Ok(MetricKind::PodCount),
            "node_count" => Ok(MetricKind::NodeCount),
            "running_pods" => Ok(MetricKind::RunningPods),
            "cpu_millicores" => Ok(MetricKind::CpuMillicores),
            "memory_mb" => Ok(MetricKind::MemoryMb),
            other => Err(format!("unknown metric kind: {other}")),
        }
    }
}

/// One observed metric value, owned by an edge site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Owning site
    pub site_id: i64,

    pub kind: MetricKind,
    pub value: f64,
    pub unit: String,

    // === optional observation context ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Free-form label map, stored as JSON
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    /// Set by the collector for the whole pass, never user-supplied
    pub recorded_at: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        site_id: i64,
        kind: MetricKind,
        value: f64,
        unit: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            site_id,
            kind,
            value,
            unit: unit.into(),
            node_name: None,
            pod_name: None,
            namespace: None,
            labels: HashMap::new(),
            recorded_at,
        }
    }

    pub fn with_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    pub fn with_pod(mut self, pod_name: impl Into<String>) -> Self {
        self.pod_name = Some(pod_name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Enforced by every backend before a batch is written.
    pub fn validate(&self) -> StorageResult<()> {
        if !self.value.is_finite() {
            return Err(StorageError::InvalidSample(format!(
                "non-finite value for {}",
                self.kind
            )));
        }
        Ok(())
    }
}
