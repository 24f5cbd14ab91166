//! Wire types for the cluster REST APIs
//!
//! Deserialized straight from the JSON the API groups return. Only the
//! fields the probes and the collector actually read are modeled; unknown
//! fields are ignored, absent fields default.

use std::collections::HashMap;

use serde::Deserialize;

use super::client::ApiClient;
use super::error::ClusterResult;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ObjectMeta {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

// === core/v1 ===

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<Pod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
}

impl Pod {
    pub fn is_running(&self) -> bool {
        self.status.phase.as_deref() == Some("Running")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeList {
    #[serde(default)]
    pub items: Vec<Node>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

impl Node {
    /// A node is ready when its `Ready` condition reports `True`.
    pub fn is_ready(&self) -> bool {
        self.status
            .conditions
            .iter()
            .find(|c| c.kind == "Ready")
            .map(|c| c.status == "True")
            .unwrap_or(false)
    }
}

// === apps/v1 ===

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentList {
    #[serde(default)]
    pub items: Vec<Deployment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
    #[serde(default)]
    pub status: DeploymentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentSpec {
    #[serde(default)]
    pub replicas: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentStatus {
    #[serde(rename = "availableReplicas", default)]
    pub available_replicas: Option<i32>,
}

impl Deployment {
    pub fn desired(&self) -> i32 {
        self.spec.replicas.unwrap_or(0)
    }

    pub fn available(&self) -> i32 {
        self.status.available_replicas.unwrap_or(0)
    }

    /// Scaled-to-zero deployments are vacuously satisfied.
    pub fn is_satisfied(&self) -> bool {
        self.desired() == 0 || self.available() >= self.desired()
    }
}

// === metrics.k8s.io/v1beta1 ===

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeMetricsList {
    #[serde(default)]
    pub items: Vec<NodeMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeMetrics {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub usage: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodMetricsList {
    #[serde(default)]
    pub items: Vec<PodMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodMetrics {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerMetrics {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub usage: HashMap<String, String>,
}

impl NodeMetrics {
    pub fn cpu(&self) -> &str {
        usage_value(&self.usage, "cpu")
    }

    pub fn memory(&self) -> &str {
        usage_value(&self.usage, "memory")
    }
}

impl ContainerMetrics {
    pub fn cpu(&self) -> &str {
        usage_value(&self.usage, "cpu")
    }

    pub fn memory(&self) -> &str {
        usage_value(&self.usage, "memory")
    }
}

fn usage_value<'a>(usage: &'a HashMap<String, String>, key: &str) -> &'a str {
    usage.get(key).map(String::as_str).unwrap_or("")
}

// === typed fetchers ===

impl ApiClient {
    /// List pods in a namespace (core scope).
    pub async fn list_pods(&self, namespace: &str) -> ClusterResult<PodList> {
        self.get_json(&format!("namespaces/{namespace}/pods")).await
    }

    /// List all nodes (core scope).
    pub async fn list_nodes(&self) -> ClusterResult<NodeList> {
        self.get_json("nodes").await
    }

    /// List deployments in a namespace (apps scope).
    pub async fn list_deployments(&self, namespace: &str) -> ClusterResult<DeploymentList> {
        self.get_json(&format!("namespaces/{namespace}/deployments"))
            .await
    }

    /// Cluster-wide node metrics (metrics scope).
    pub async fn node_metrics(&self) -> ClusterResult<NodeMetricsList> {
        self.get_json("nodes").await
    }

    /// Cluster-wide pod metrics (metrics scope).
    pub async fn pod_metrics(&self) -> ClusterResult<PodMetricsList> {
        self.get_json("pods").await
    }

    /// Namespace-scoped pod metrics (metrics scope).
    pub async fn pod_metrics_in(&self, namespace: &str) -> ClusterResult<PodMetricsList> {
        self.get_json(&format!("namespaces/{namespace}/pods")).await
    }
}
