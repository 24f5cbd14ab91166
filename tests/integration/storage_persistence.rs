//! End-to-end persistence tests: collection passes against the SQLite store

use std::sync::Arc;

use edgewatch::SiteStatus;
use edgewatch::collector::MetricsCollector;
use edgewatch::storage::{MetricKind, SiteStore, SqliteStore};
use edgewatch::{NewSite, slugify};
use wiremock::MockServer;

use crate::helpers::*;

async fn sqlite_store() -> (tempfile::TempDir, Arc<SqliteStore>) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("test.db"))
        .await
        .unwrap();
    (temp_dir, Arc::new(store))
}

#[tokio::test]
async fn test_pass_persists_through_sqlite() {
    let mock_server = MockServer::start().await;
    mount_full_access_cluster(&mock_server, &["2000000000n"]).await;

    let (_dir, store) = sqlite_store().await;
    let mut registration = NewSite::new("Edge West", mock_server.uri(), "test-token");
    registration.environment = "test".to_string();
    let site = store.insert_site(registration).await.unwrap();

    let (event_tx, _event_rx) = event_channel();
    let outcome = MetricsCollector::new(&site, store.as_ref(), &event_tx)
        .collect()
        .await
        .unwrap();
    assert!(outcome.success);

    // chart surface, ascending time
    let points = store
        .samples_by_kind(site.id, MetricKind::CpuPercent)
        .await
        .unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].1, 50.0);

    let latest = store
        .latest_by_kind(site.id, MetricKind::MemoryPercent)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.value, 25.0);
    assert_eq!(latest.node_name.as_deref(), Some("node-0"));

    // status written through the same store
    let updated = store.site(site.id).await.unwrap();
    assert_eq!(updated.status, SiteStatus::Healthy);
    assert_eq!(
        updated.last_seen_at.unwrap().timestamp_millis(),
        outcome.samples[0].recorded_at.timestamp_millis()
    );
}

#[tokio::test]
async fn test_successive_passes_accumulate_series() {
    let mock_server = MockServer::start().await;
    mount_full_access_cluster(&mock_server, &["1000000000n"]).await;

    let (_dir, store) = sqlite_store().await;
    let mut registration = NewSite::new("Edge West", mock_server.uri(), "test-token");
    registration.environment = "test".to_string();
    let site = store.insert_site(registration).await.unwrap();

    let (event_tx, _event_rx) = event_channel();
    for _ in 0..3 {
        MetricsCollector::new(&site, store.as_ref(), &event_tx)
            .collect()
            .await
            .unwrap();
    }

    let points = store
        .samples_by_kind(site.id, MetricKind::CpuPercent)
        .await
        .unwrap();
    assert_eq!(points.len(), 3);
    assert!(points.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn test_administrative_edit_leaves_slug_and_status_alone() {
    let (_dir, store) = sqlite_store().await;
    let site = store
        .insert_site(NewSite::new("Edge West", "https://old.example.com", "old"))
        .await
        .unwrap();
    assert_eq!(site.slug, slugify("Edge West"));

    store
        .update_site_status(site.id, SiteStatus::Degraded, None)
        .await
        .unwrap();

    let mut edited = store.site(site.id).await.unwrap();
    edited.name = "Edge West (renamed)".to_string();
    edited.api_endpoint = "https://new.example.com".to_string();
    edited.api_token = "new".to_string();
    store.update_site(&edited).await.unwrap();

    let reloaded = store.site(site.id).await.unwrap();
    assert_eq!(reloaded.name, "Edge West (renamed)");
    assert_eq!(reloaded.api_endpoint, "https://new.example.com");
    // slug is immutable once set, status untouched by the edit
    assert_eq!(reloaded.slug, "edge-west");
    assert_eq!(reloaded.status, SiteStatus::Degraded);
}
