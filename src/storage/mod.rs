//! Persistence for sites and their metric samples
//!
//! This module provides a trait-based abstraction for storing edge sites
//! and the samples collected from them.
//!
//! ## Design
//!
//! - **Trait-based**: `SiteStore` allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio
//! - **Batch-oriented**: one collection pass writes one atomic batch
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database, WAL mode, cascade deletes
//! - **In-Memory**: no persistence, for testing or storage-less runs

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use backend::{CHART_POINT_CAP, HealthStatus, SiteStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use schema::{MetricKind, MetricSample};
pub use sqlite::SqliteStore;
