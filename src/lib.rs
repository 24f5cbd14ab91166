pub mod actors;
pub mod cluster;
pub mod collector;
pub mod config;
pub mod health;
pub mod quantity;
pub mod storage;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Slugs are URL-safe: lowercase alphanumerics and dashes only.
static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("slug pattern is valid"));

/// A site counts as fresh when it reported within this window.
const FRESHNESS_WINDOW_MINUTES: i64 = 5;

/// Coarse health classification of an edge site
///
/// Only the health/metrics pipeline writes this; it is never set directly
/// by an administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Unknown,
    Healthy,
    Degraded,
    Critical,
    Offline,
}

impl SiteStatus {
    pub fn is_offline(&self) -> bool {
        matches!(self, SiteStatus::Offline)
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SiteStatus::Unknown => "unknown",
            SiteStatus::Healthy => "healthy",
            SiteStatus::Degraded => "degraded",
            SiteStatus::Critical => "critical",
            SiteStatus::Offline => "offline",
        };
        write!(f, "{name}")
    }
}

impl FromStr for SiteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(SiteStatus::Unknown),
            "healthy" => Ok(SiteStatus::Healthy),
            "degraded" => Ok(SiteStatus::Degraded),
            "critical" => Ok(SiteStatus::Critical),
            "offline" => Ok(SiteStatus::Offline),
            other => Err(format!("unknown site status: {other}")),
        }
    }
}

/// One monitored remote cluster endpoint
#[derive(Clone, PartialEq)]
pub struct EdgeSite {
    pub id: i64,
    pub name: String,

    /// URL-safe identifier, unique and immutable once set
    pub slug: String,

    /// Base URL of the cluster API server
    pub api_endpoint: String,

    /// Bearer token; redacted from Debug output
    pub api_token: String,

    /// Presence implies namespace-restricted access
    pub namespace: Option<String>,

    pub region: Option<String>,
    pub environment: String,
    pub status: SiteStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Capability descriptor for a site's access scope
///
/// Both the health checker and the collector branch on this one value, so
/// the restricted and full-access pipelines cannot drift apart on what
/// "restricted" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode<'a> {
    /// Access limited to one namespace
    Restricted { namespace: &'a str },

    /// Cluster-scoped access to node and metrics APIs
    Full,
}

impl EdgeSite {
    pub fn access_mode(&self) -> AccessMode<'_> {
        match self.namespace.as_deref() {
            Some(namespace) if !namespace.is_empty() => AccessMode::Restricted { namespace },
            _ => AccessMode::Full,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Healthy status that is also recent enough to trust.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.status == SiteStatus::Healthy
            && self
                .last_seen_at
                .map(|seen| seen > now - Duration::minutes(FRESHNESS_WINDOW_MINUTES))
                .unwrap_or(false)
    }
}

impl fmt::Debug for EdgeSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeSite")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("slug", &self.slug)
            .field("api_endpoint", &self.api_endpoint)
            .field("api_token", &"<redacted>")
            .field("namespace", &self.namespace)
            .field("region", &self.region)
            .field("environment", &self.environment)
            .field("status", &self.status)
            .field("last_seen_at", &self.last_seen_at)
            .finish()
    }
}

/// A site registration, before the store has assigned an id
#[derive(Debug, Clone)]
pub struct NewSite {
    pub name: String,

    /// Explicit slug; derived from the name when absent
    pub slug: Option<String>,

    pub api_endpoint: String,
    pub api_token: String,
    pub namespace: Option<String>,
    pub region: Option<String>,
    pub environment: String,
}

impl NewSite {
    pub fn new(
        name: impl Into<String>,
        api_endpoint: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            slug: None,
            api_endpoint: api_endpoint.into(),
            api_token: api_token.into(),
            namespace: None,
            region: None,
            environment: "production".to_string(),
        }
    }

    /// The slug this registration will be stored under.
    pub fn resolved_slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

/// Derive a URL-safe slug from a human name.
///
/// Lowercases, collapses every run of non-alphanumerics into a single
/// dash, and trims leading/trailing dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}
