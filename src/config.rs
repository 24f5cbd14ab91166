use std::fmt;
use std::path::PathBuf;

use tracing::trace;

use crate::NewSite;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Retention period in days (samples older than this are deleted)
        #[serde(default = "default_retention_days")]
        retention_days: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./edgewatch.db")
}

fn default_retention_days() -> u32 {
    30
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Sites to register at startup (idempotent by slug)
    pub sites: Option<Vec<SiteConfig>>,

    /// Storage configuration (optional - defaults to SQLite)
    pub storage: Option<StorageConfig>,

    /// Seconds between collection passes per site
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Seconds between fleet sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// One site entry in the config file
#[derive(Clone, serde::Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub api_endpoint: String,
    pub api_token: String,
    pub slug: Option<String>,
    pub namespace: Option<String>,
    pub region: Option<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl SiteConfig {
    pub fn to_new_site(&self) -> NewSite {
        NewSite {
            name: self.name.clone(),
            slug: self.slug.clone(),
            api_endpoint: self.api_endpoint.clone(),
            api_token: self.api_token.clone(),
            namespace: self.namespace.clone(),
            region: self.region.clone(),
            environment: self.environment.clone(),
        }
    }
}

// keep the token out of config dumps
impl fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfig")
            .field("name", &self.name)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_token", &"<redacted>")
            .field("slug", &self.slug)
            .field("namespace", &self.namespace)
            .field("region", &self.region)
            .field("environment", &self.environment)
            .finish()
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    300
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
