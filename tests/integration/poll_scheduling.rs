//! Scheduling tests: retry budget, discard, and sweep behavior
//!
//! Timings here use a long poll interval (so only the initial pass fires)
//! and short retry delays to keep the tests fast.

use std::sync::Arc;
use std::time::Duration;

use edgewatch::actors::{FleetSweep, PollerHandle};
use edgewatch::collector::CollectError;
use edgewatch::storage::{MemoryStore, MetricKind, SiteStore};
use edgewatch::{NewSite, SiteStatus};
use wiremock::MockServer;

use crate::helpers::*;

const NO_RESCHEDULE: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_configuration_error_retries_then_succeeds() {
    let mock_server = MockServer::start().await;
    mount_full_access_cluster(&mock_server, &["1000000000n"]).await;

    let store = Arc::new(MemoryStore::new());
    // a token that cannot become a header value → configuration error
    let mut registration = NewSite::new("Site A", mock_server.uri(), "bad\ntoken");
    registration.environment = "test".to_string();
    let site = store.insert_site(registration).await.unwrap();

    let (event_tx, _event_rx) = event_channel();
    let handle = PollerHandle::spawn_with(
        site.id,
        store.clone(),
        event_tx,
        NO_RESCHEDULE,
        Duration::from_millis(400),
    );

    // first attempt has failed by now and the poller is waiting to retry;
    // fix the credential so the retry can succeed
    tokio::time::sleep(Duration::from_millis(150)).await;
    let mut fixed = store.site(site.id).await.unwrap();
    fixed.api_token = "test-token".to_string();
    store.update_site(&fixed).await.unwrap();

    // wait past the retry delay
    tokio::time::sleep(Duration::from_millis(700)).await;

    let updated = store.site(site.id).await.unwrap();
    assert_eq!(updated.status, SiteStatus::Healthy);
    assert!(updated.last_seen_at.is_some());

    let samples = store
        .samples_by_kind(site.id, MetricKind::CpuPercent)
        .await
        .unwrap();
    assert!(!samples.is_empty());

    // normal rescheduling continues after the recovered pass
    assert!(!handle.is_finished());
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let store = Arc::new(MemoryStore::new());
    let site = store
        .insert_site(NewSite::new("Broken", "not a url", "token"))
        .await
        .unwrap();

    let (event_tx, _event_rx) = event_channel();
    let handle = PollerHandle::spawn_with(
        site.id,
        store.clone(),
        event_tx,
        NO_RESCHEDULE,
        Duration::from_millis(50),
    );

    // three attempts at 50ms apart fit comfortably in here; a retry loop
    // that never gave up would still be spinning
    tokio::time::sleep(Duration::from_millis(500)).await;

    // the invocation failed permanently but the poller survives
    assert!(!handle.is_finished());

    // and it still answers on-demand requests (with the same error)
    let err = handle.poll_now().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CollectError>(),
        Some(CollectError::Configuration(_))
    ));

    // nothing was derived or stamped for the unreachable site
    let unchanged = store.site(site.id).await.unwrap();
    assert_eq!(unchanged.status, SiteStatus::Unknown);
    assert!(unchanged.last_seen_at.is_none());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deleted_site_poll_is_discarded_silently() {
    let mock_server = MockServer::start().await;
    mount_full_access_cluster(&mock_server, &["1000000000n"]).await;

    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Site A", &mock_server.uri()).await;

    let (event_tx, _event_rx) = event_channel();
    let mut sweep = FleetSweep::new(store.clone(), event_tx, NO_RESCHEDULE);
    sweep.sweep_once().await.unwrap();
    assert_eq!(sweep.poller_count(), 1);

    // let the initial pass finish, then delete the site
    tokio::time::sleep(Duration::from_millis(200)).await;
    store.delete_site(site.id).await.unwrap();

    // the next poll finds the site gone and the actor exits on its own
    let handle = sweep.poller(site.id).unwrap().clone();
    let err = handle.poll_now().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CollectError>(),
        Some(CollectError::NotFound(_))
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.is_finished());

    // the sweep prunes the dead poller and does not respawn it
    let spawned = sweep.sweep_once().await.unwrap();
    assert_eq!(spawned, 0);
    assert_eq!(sweep.poller_count(), 0);
}

#[tokio::test]
async fn test_scheduled_pass_collects_on_spawn() {
    let mock_server = MockServer::start().await;
    mount_full_access_cluster(&mock_server, &["1000000000n"]).await;

    let store = Arc::new(MemoryStore::new());
    let site = register_site(&store, "Site A", &mock_server.uri()).await;

    let (event_tx, mut event_rx) = event_channel();
    let handle = PollerHandle::spawn_with(
        site.id,
        store.clone(),
        event_tx,
        NO_RESCHEDULE,
        Duration::from_millis(50),
    );

    // the first tick fires immediately: the initial collection
    let event = tokio::time::timeout(Duration::from_secs(2), event_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.site_id, site.id);
    assert_eq!(event.status, SiteStatus::Healthy);

    handle.shutdown().await.unwrap();
}
