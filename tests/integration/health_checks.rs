//! Health check tests against a mocked cluster
//!
//! One probe set per access mode, folded by a fixed precedence rule.
//! Probes swallow their own transport errors, so a single failing sub-API
//! shows up as a failed probe, not an aborted check.

use std::sync::Arc;

use edgewatch::SiteStatus;
use pretty_assertions::assert_eq;
use edgewatch::health::{
    API_REACHABLE, CONFIG_ERROR, DEPLOYMENTS_READY, HealthChecker, METRICS_AVAILABLE,
    NODES_READY, PODS_HEALTHY, check_site,
};
use edgewatch::storage::MemoryStore;
use edgewatch::storage::SiteStore;
use serde_json::json;
use wiremock::MockServer;

use crate::helpers::*;

#[tokio::test]
async fn test_full_access_all_probes_pass() {
    let mock_server = MockServer::start().await;
    mount_full_access_cluster(&mock_server, &["1000000000n"]).await;

    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Site A", &mock_server.uri()).await;

    let report = HealthChecker::new(&site).check().await;

    assert!(report.healthy);
    assert_eq!(report.status, SiteStatus::Healthy);
    assert!(report.details[API_REACHABLE].ok);
    assert!(report.details[NODES_READY].ok);
    assert!(report.details[METRICS_AVAILABLE].ok);
    assert_eq!(report.details[NODES_READY].ready, Some(1));
    assert_eq!(report.details[NODES_READY].total, Some(1));
}

#[tokio::test]
async fn test_unreachable_api_is_offline() {
    let mock_server = MockServer::start().await;
    mount_status(&mock_server, CORE_BASE, 503).await;
    mount_status(&mock_server, &format!("{CORE_BASE}/nodes"), 503).await;
    mount_status(&mock_server, &format!("{METRICS_BASE}/nodes"), 503).await;

    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Site A", &mock_server.uri()).await;

    let report = HealthChecker::new(&site).check().await;

    assert!(!report.healthy);
    assert_eq!(report.status, SiteStatus::Offline);
    assert!(!report.details[API_REACHABLE].ok);
    assert!(
        report.details[API_REACHABLE]
            .message
            .starts_with("API unreachable")
    );
}

#[tokio::test]
async fn test_unready_node_is_critical() {
    let mock_server = MockServer::start().await;
    mount_json(&mock_server, CORE_BASE, json!({ "kind": "APIResourceList" })).await;
    mount_json(
        &mock_server,
        &format!("{CORE_BASE}/nodes"),
        node_list_json(&[true, false]),
    )
    .await;
    mount_json(
        &mock_server,
        &format!("{METRICS_BASE}/nodes"),
        node_metrics_json(&[("node-0", "100m", "1Gi")]),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Site A", &mock_server.uri()).await;

    let report = HealthChecker::new(&site).check().await;

    assert!(!report.healthy);
    assert_eq!(report.status, SiteStatus::Critical);
    assert_eq!(report.details[NODES_READY].ready, Some(1));
    assert_eq!(report.details[NODES_READY].total, Some(2));
}

#[tokio::test]
async fn test_missing_metrics_server_is_degraded() {
    let mock_server = MockServer::start().await;
    mount_json(&mock_server, CORE_BASE, json!({ "kind": "APIResourceList" })).await;
    mount_json(
        &mock_server,
        &format!("{CORE_BASE}/nodes"),
        node_list_json(&[true]),
    )
    .await;
    mount_status(&mock_server, &format!("{METRICS_BASE}/nodes"), 404).await;

    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Site A", &mock_server.uri()).await;

    let report = HealthChecker::new(&site).check().await;

    assert!(!report.healthy);
    assert_eq!(report.status, SiteStatus::Degraded);
    assert!(
        report.details[METRICS_AVAILABLE]
            .message
            .starts_with("Metrics unavailable")
    );
}

#[tokio::test]
async fn test_restricted_probe_set_healthy() {
    let namespace = "tenant-a";
    let mock_server = MockServer::start().await;
    mount_json(&mock_server, CORE_BASE, json!({ "kind": "APIResourceList" })).await;
    mount_json(
        &mock_server,
        &format!("{CORE_BASE}/namespaces/{namespace}/pods"),
        pod_list_json(&["Running", "Running"]),
    )
    .await;
    mount_json(
        &mock_server,
        &format!("{APPS_BASE}/namespaces/{namespace}/deployments"),
        deployment_list_json(&[(2, 2), (0, 0)]),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let site = register_restricted_site(&store, "Sandbox", &mock_server.uri(), namespace).await;

    let report = HealthChecker::new(&site).check().await;

    assert!(report.healthy);
    assert_eq!(report.status, SiteStatus::Healthy);
    assert!(report.details[PODS_HEALTHY].ok);
    // scaled-to-zero deployments don't count against readiness
    assert!(report.details[DEPLOYMENTS_READY].ok);
    assert!(!report.details.contains_key(NODES_READY));
}

#[tokio::test]
async fn test_restricted_no_running_pods_is_critical() {
    let namespace = "tenant-a";
    let mock_server = MockServer::start().await;
    mount_json(&mock_server, CORE_BASE, json!({ "kind": "APIResourceList" })).await;
    mount_json(
        &mock_server,
        &format!("{CORE_BASE}/namespaces/{namespace}/pods"),
        pod_list_json(&["Pending", "Failed"]),
    )
    .await;
    mount_json(
        &mock_server,
        &format!("{APPS_BASE}/namespaces/{namespace}/deployments"),
        deployment_list_json(&[(2, 2)]),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let site = register_restricted_site(&store, "Sandbox", &mock_server.uri(), namespace).await;

    let report = HealthChecker::new(&site).check().await;

    assert!(!report.healthy);
    assert_eq!(report.status, SiteStatus::Critical);
    assert_eq!(report.details[PODS_HEALTHY].ready, Some(0));
}

#[tokio::test]
async fn test_restricted_unready_deployment_is_degraded() {
    let namespace = "tenant-a";
    let mock_server = MockServer::start().await;
    mount_json(&mock_server, CORE_BASE, json!({ "kind": "APIResourceList" })).await;
    mount_json(
        &mock_server,
        &format!("{CORE_BASE}/namespaces/{namespace}/pods"),
        pod_list_json(&["Running"]),
    )
    .await;
    mount_json(
        &mock_server,
        &format!("{APPS_BASE}/namespaces/{namespace}/deployments"),
        deployment_list_json(&[(3, 1)]),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let site = register_restricted_site(&store, "Sandbox", &mock_server.uri(), namespace).await;

    let report = HealthChecker::new(&site).check().await;

    assert!(!report.healthy);
    assert_eq!(report.status, SiteStatus::Degraded);
}

#[tokio::test]
async fn test_configuration_error_short_circuits_to_offline() {
    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Broken", "not a url").await;

    let report = HealthChecker::new(&site).check().await;

    assert!(!report.healthy);
    assert_eq!(report.status, SiteStatus::Offline);
    assert!(report.details.contains_key(CONFIG_ERROR));
    assert!(!report.details.contains_key(API_REACHABLE));
}

#[tokio::test]
async fn test_check_is_idempotent_and_side_effect_free() {
    let mock_server = MockServer::start().await;
    mount_full_access_cluster(&mock_server, &["1000000000n"]).await;

    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Site A", &mock_server.uri()).await;

    let first = check_site(store.as_ref(), site.id).await.unwrap();
    let second = check_site(store.as_ref(), site.id).await.unwrap();

    // same cluster state → same result
    assert_eq!(first.status, second.status);
    assert_eq!(first.healthy, second.healthy);

    // read-only: the stored site was not touched
    let stored = store.site(site.id).await.unwrap();
    assert_eq!(stored.status, SiteStatus::Unknown);
    assert!(stored.last_seen_at.is_none());
}
