//! Shared helpers for the integration tests
//!
//! The cluster APIs are mocked with wiremock; helpers here build the JSON
//! payload shapes the collector and health checker consume.

use std::sync::Arc;

use edgewatch::actors::SiteEvent;
use edgewatch::storage::{MemoryStore, SiteStore};
use edgewatch::{EdgeSite, NewSite};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// group base paths, as the scoped clients assemble them
pub const CORE_BASE: &str = "/api/v1";
pub const METRICS_BASE: &str = "/apis/metrics.k8s.io/v1beta1";
pub const APPS_BASE: &str = "/apis/apps/v1";

pub fn event_channel() -> (
    broadcast::Sender<SiteEvent>,
    broadcast::Receiver<SiteEvent>,
) {
    broadcast::channel(16)
}

/// Register a full-access site pointing at a mock server.
pub async fn register_site(store: &Arc<MemoryStore>, name: &str, endpoint: &str) -> EdgeSite {
    let mut site = NewSite::new(name, endpoint, "test-token");
    site.environment = "test".to_string();
    store.insert_site(site).await.unwrap()
}

/// Register a namespace-restricted site pointing at a mock server.
pub async fn register_restricted_site(
    store: &Arc<MemoryStore>,
    name: &str,
    endpoint: &str,
    namespace: &str,
) -> EdgeSite {
    let mut site = NewSite::new(name, endpoint, "test-token");
    site.environment = "test".to_string();
    site.namespace = Some(namespace.to_string());
    store.insert_site(site).await.unwrap()
}

pub async fn mount_json(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, at: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Node metrics payload: (node name, cpu quantity, memory quantity)
pub fn node_metrics_json(nodes: &[(&str, &str, &str)]) -> Value {
    json!({
        "items": nodes
            .iter()
            .map(|(name, cpu, memory)| {
                json!({
                    "metadata": { "name": name },
                    "usage": { "cpu": cpu, "memory": memory }
                })
            })
            .collect::<Vec<_>>()
    })
}

/// Pod metrics payload: (pod name, [(container name, cpu, memory)])
pub fn pod_metrics_json(pods: &[(&str, &[(&str, &str, &str)])]) -> Value {
    json!({
        "items": pods
            .iter()
            .map(|(pod, containers)| {
                json!({
                    "metadata": { "name": pod },
                    "containers": containers
                        .iter()
                        .map(|(name, cpu, memory)| {
                            json!({
                                "name": name,
                                "usage": { "cpu": cpu, "memory": memory }
                            })
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>()
    })
}

/// Pod list payload, one pod per phase entry.
pub fn pod_list_json(phases: &[&str]) -> Value {
    json!({
        "items": phases
            .iter()
            .enumerate()
            .map(|(i, phase)| {
                json!({
                    "metadata": { "name": format!("pod-{i}") },
                    "status": { "phase": phase }
                })
            })
            .collect::<Vec<_>>()
    })
}

/// Node list payload, one node per readiness entry.
pub fn node_list_json(ready: &[bool]) -> Value {
    json!({
        "items": ready
            .iter()
            .enumerate()
            .map(|(i, is_ready)| {
                json!({
                    "metadata": { "name": format!("node-{i}") },
                    "status": {
                        "conditions": [
                            { "type": "Ready", "status": if *is_ready { "True" } else { "False" } }
                        ]
                    }
                })
            })
            .collect::<Vec<_>>()
    })
}

/// Deployment list payload: (desired, available) per deployment.
pub fn deployment_list_json(replicas: &[(i32, i32)]) -> Value {
    json!({
        "items": replicas
            .iter()
            .enumerate()
            .map(|(i, (desired, available))| {
                json!({
                    "metadata": { "name": format!("deploy-{i}") },
                    "spec": { "replicas": desired },
                    "status": { "availableReplicas": available }
                })
            })
            .collect::<Vec<_>>()
    })
}

/// Mount a healthy full-access cluster: responding API root, ready nodes,
/// node metrics at the given CPU quantities (memory fixed at 2Gi), and a
/// one-pod pod-metrics list.
pub async fn mount_full_access_cluster(server: &MockServer, node_cpus: &[&str]) {
    mount_json(server, CORE_BASE, json!({ "kind": "APIResourceList" })).await;

    let ready: Vec<bool> = node_cpus.iter().map(|_| true).collect();
    mount_json(server, &format!("{CORE_BASE}/nodes"), node_list_json(&ready)).await;

    let metric_items: Vec<Value> = node_cpus
        .iter()
        .enumerate()
        .map(|(i, cpu)| {
            json!({
                "metadata": { "name": format!("node-{i}") },
                "usage": { "cpu": cpu, "memory": "2Gi" }
            })
        })
        .collect();
    mount_json(
        server,
        &format!("{METRICS_BASE}/nodes"),
        json!({ "items": metric_items }),
    )
    .await;

    mount_json(
        server,
        &format!("{METRICS_BASE}/pods"),
        pod_metrics_json(&[("pod-0", &[("app", "100m", "128Mi")])]),
    )
    .await;
}
