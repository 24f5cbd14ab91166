//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `SiteStore`
//! trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//! - **Foreign keys on**: site deletion cascades to samples in-engine
//!
//! ## Limitations
//!
//! - **Concurrency**: Limited concurrent writes (fine for the per-site
//!   poll cadence this system runs at)
//! - **Distributed**: Single-machine only

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{CHART_POINT_CAP, HealthStatus, SiteStore};
use super::error::{StorageError, StorageResult};
use super::schema::{MetricKind, MetricSample};
use crate::{EdgeSite, NewSite, SiteStatus, is_valid_slug, quantity};

/// SQLite-backed site store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Create a new SQLite store
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for this workload (WAL mode, foreign keys on)
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true) // sample cascade relies on this
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn row_to_site(row: &sqlx::sqlite::SqliteRow) -> StorageResult<EdgeSite> {
        let status_str: String = row.get("status");
        let status = SiteStatus::from_str(&status_str)
            .map_err(StorageError::SerializationError)?;

        Ok(EdgeSite {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            api_endpoint: row.get("api_endpoint"),
            api_token: row.get("api_token"),
            namespace: row.get("namespace"),
            region: row.get("region"),
            environment: row.get("environment"),
            status,
            last_seen_at: row
                .get::<Option<i64>, _>("last_seen_at")
                .map(Self::millis_to_timestamp),
        })
    }

    fn row_to_sample(row: &sqlx::sqlite::SqliteRow) -> StorageResult<MetricSample> {
        let kind_str: String = row.get("kind");
        let kind = MetricKind::from_str(&kind_str).map_err(StorageError::SerializationError)?;

        let labels_str: String = row.get("labels");
        let labels: HashMap<String, String> = serde_json::from_str(&labels_str)
            .map_err(|e| StorageError::SerializationError(format!("labels: {e}")))?;

        Ok(MetricSample {
            site_id: row.get("site_id"),
            kind,
            value: row.get("value"),
            unit: row.get("unit"),
            node_name: row.get("node_name"),
            pod_name: row.get("pod_name"),
            namespace: row.get("namespace"),
            labels,
            recorded_at: Self::millis_to_timestamp(row.get("recorded_at")),
        })
    }

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }
}

#[async_trait]
impl SiteStore for SqliteStore {
    #[instrument(skip(self, site), fields(name = %site.name))]
    async fn insert_site(&self, site: NewSite) -> StorageResult<EdgeSite> {
        let slug = site.resolved_slug();
        if !is_valid_slug(&slug) {
            return Err(StorageError::InvalidSlug(slug));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO edge_sites (
                name, slug, api_endpoint, api_token,
                namespace, region, environment, status, last_seen_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&site.name)
        .bind(&slug)
        .bind(&site.api_endpoint)
        .bind(&site.api_token)
        .bind(&site.namespace)
        .bind(&site.region)
        .bind(&site.environment)
        .bind(SiteStatus::Unknown.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                StorageError::DuplicateSlug(slug.clone())
            } else {
                StorageError::QueryFailed(e.to_string())
            }
        })?;

        debug!("registered site {slug}");

        Ok(EdgeSite {
            id: result.last_insert_rowid(),
            name: site.name,
            slug,
            api_endpoint: site.api_endpoint,
            api_token: site.api_token,
            namespace: site.namespace,
            region: site.region,
            environment: site.environment,
            status: SiteStatus::Unknown,
            last_seen_at: None,
        })
    }

    async fn site(&self, id: i64) -> StorageResult<EdgeSite> {
        let row = sqlx::query("SELECT * FROM edge_sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?
            .ok_or_else(|| StorageError::NotFound(format!("site {id}")))?;

        Self::row_to_site(&row)
    }

    async fn site_by_slug(&self, slug: &str) -> StorageResult<EdgeSite> {
        let row = sqlx::query("SELECT * FROM edge_sites WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?
            .ok_or_else(|| StorageError::NotFound(format!("site {slug}")))?;

        Self::row_to_site(&row)
    }

    async fn active_sites(&self) -> StorageResult<Vec<EdgeSite>> {
        let rows = sqlx::query("SELECT * FROM edge_sites WHERE status != ? ORDER BY name")
            .bind(SiteStatus::Offline.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_site).collect()
    }

    #[instrument(skip(self))]
    async fn update_site_status(
        &self,
        site_id: i64,
        status: SiteStatus,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> StorageResult<()> {
        sqlx::query("UPDATE edge_sites SET status = ?, last_seen_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(last_seen_at.as_ref().map(Self::timestamp_to_millis))
            .bind(site_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self, site), fields(site_id = site.id))]
    async fn update_site(&self, site: &EdgeSite) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE edge_sites
            SET name = ?, api_endpoint = ?, api_token = ?,
                namespace = ?, region = ?, environment = ?
            WHERE id = ?
            "#,
        )
        .bind(&site.name)
        .bind(&site.api_endpoint)
        .bind(&site.api_token)
        .bind(&site.namespace)
        .bind(&site.region)
        .bind(&site.environment)
        .bind(site.id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("site {}", site.id)));
        }
        Ok(())
    }

    #[instrument(skip(self, samples), fields(count = samples.len()))]
    async fn insert_samples(&self, samples: Vec<MetricSample>) -> StorageResult<()> {
        if samples.is_empty() {
            return Ok(());
        }

        // Reject the whole batch before the transaction opens.
        for sample in &samples {
            sample.validate()?;
        }

        debug!("inserting {} samples", samples.len());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        for sample in samples {
            let labels_json = serde_json::to_string(&sample.labels).map_err(|e| {
                StorageError::SerializationError(format!("failed to serialize labels: {e}"))
            })?;

            sqlx::query(
                r#"
                INSERT INTO metric_samples (
                    site_id, kind, value, unit,
                    node_name, pod_name, namespace, labels, recorded_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(sample.site_id)
            .bind(sample.kind.to_string())
            .bind(sample.value)
            .bind(&sample.unit)
            .bind(&sample.node_name)
            .bind(&sample.pod_name)
            .bind(&sample.namespace)
            .bind(labels_json)
            .bind(Self::timestamp_to_millis(&sample.recorded_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        debug!("batch insert complete");
        Ok(())
    }

    async fn samples_by_kind(
        &self,
        site_id: i64,
        kind: MetricKind,
    ) -> StorageResult<Vec<(DateTime<Utc>, f64)>> {
        let rows = sqlx::query(
            r#"
            SELECT recorded_at, value
            FROM metric_samples
            WHERE site_id = ? AND kind = ?
            ORDER BY recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(site_id)
        .bind(kind.to_string())
        .bind(CHART_POINT_CAP as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let mut points: Vec<(DateTime<Utc>, f64)> = rows
            .into_iter()
            .map(|row| {
                (
                    Self::millis_to_timestamp(row.get("recorded_at")),
                    row.get("value"),
                )
            })
            .collect();

        // Reverse to get chronological order (oldest first)
        points.reverse();
        Ok(points)
    }

    async fn latest_by_kind(
        &self,
        site_id: i64,
        kind: MetricKind,
    ) -> StorageResult<Option<MetricSample>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM metric_samples
            WHERE site_id = ? AND kind = ?
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(site_id)
        .bind(kind.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_sample).transpose()
    }

    async fn average_over(
        &self,
        site_id: i64,
        kind: MetricKind,
        window: Duration,
    ) -> StorageResult<Option<f64>> {
        let cutoff = Utc::now() - window;

        let row: (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT AVG(value) FROM metric_samples
            WHERE site_id = ? AND kind = ? AND recorded_at >= ?
            "#,
        )
        .bind(site_id)
        .bind(kind.to_string())
        .bind(Self::timestamp_to_millis(&cutoff))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.0.map(quantity::round2))
    }

    #[instrument(skip(self))]
    async fn delete_site(&self, site_id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM edge_sites WHERE id = ?")
            .bind(site_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("site {site_id}")));
        }

        debug!("deleted site {site_id} (samples cascade)");
        Ok(())
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_old_samples(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        info!("cleaning up samples older than {}", before);

        let result = sqlx::query("DELETE FROM metric_samples WHERE recorded_at < ?")
            .bind(Self::timestamp_to_millis(&before))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let deleted = result.rows_affected() as usize;
        info!("deleted {} old samples", deleted);

        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite store operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}
