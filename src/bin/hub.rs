use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use edgewatch::{
    actors::{FleetSweep, SiteEvent},
    config::{Config, StorageConfig, read_config_file},
    storage::{MemoryStore, SiteStore, SqliteStore},
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("edgewatch", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let storage_config = config.storage.clone().unwrap_or_default();
    let store: Arc<dyn SiteStore> = match &storage_config {
        StorageConfig::None => {
            info!("running without persistence (in-memory store)");
            Arc::new(MemoryStore::new())
        }
        StorageConfig::Sqlite { path, .. } => Arc::new(SqliteStore::new(path).await?),
    };

    register_sites(&config, store.as_ref()).await?;

    let (event_tx, _) = broadcast::channel::<SiteEvent>(256);

    // demo consumer for the real-time boundary; a push channel or an
    // alerting collaborator would subscribe the same way
    spawn_event_logger(event_tx.subscribe());

    if let StorageConfig::Sqlite { retention_days, .. } = storage_config
        && retention_days > 0
    {
        spawn_retention_cleanup(store.clone(), retention_days);
    }

    let sweep = FleetSweep::new(
        store,
        event_tx,
        Duration::from_secs(config.poll_interval_secs),
    );

    info!("starting fleet sweep");
    sweep
        .run(Duration::from_secs(config.sweep_interval_secs))
        .await;

    Ok(())
}

/// Register config-file sites that are not in the store yet.
async fn register_sites(config: &Config, store: &dyn SiteStore) -> anyhow::Result<()> {
    let Some(sites) = &config.sites else {
        return Ok(());
    };

    for site_config in sites {
        let new_site = site_config.to_new_site();
        let slug = new_site.resolved_slug();

        match store.site_by_slug(&slug).await {
            Ok(_) => debug!("site {slug} already registered"),
            Err(e) if e.is_not_found() => {
                let site = store.insert_site(new_site).await?;
                info!("registered site {} ({})", site.name, site.slug);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn spawn_event_logger(mut events: broadcast::Receiver<SiteEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(
                        "site {} is now {} (seen: {:?})",
                        event.slug, event.status, event.last_seen_at
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("event logger lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn spawn_retention_cleanup(store: Arc<dyn SiteStore>, retention_days: u32) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days as i64);
            match store.cleanup_old_samples(cutoff).await {
                Ok(deleted) if deleted > 0 => info!("retention cleanup deleted {deleted} samples"),
                Ok(_) => trace!("retention cleanup: nothing to delete"),
                Err(e) => error!("retention cleanup failed: {e}"),
            }
        }
    });
}
