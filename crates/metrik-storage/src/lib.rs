//! Metric repositories for the metrik server and agent.
//!
//! Every backing implements [`Repository`]. [`memory::MemStore`] is the
//! authoritative in-process collection; [`file::FileStore`] and
//! [`sql::SqlStore`] put it in front of a durable medium and persist it on
//! flush. [`manager::MetricsManager`] wraps any of them with HMAC verification.

pub mod error;
pub mod file;
pub mod flusher;
pub mod manager;
pub mod memory;
pub mod sql;


use async_trait::async_trait;
use metrik_common::{Metric, MetricKey};
use std::sync::Arc;
use std::time::Duration;

pub use error::{Result, StorageError};
pub use file::FileStore;
pub use manager::MetricsManager;
pub use memory::MemStore;
pub use sql::SqlStore;

/// Storage contract shared by all backings.
///
/// Gauges and counters are both replaced on upsert: the stored payload and
/// hash become the incoming ones. Callers that want accumulation send the
/// accumulated value.
///
/// Implementations must be safe to share across tasks (`Send + Sync`); the
/// server calls them from concurrent request handlers.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Inserts the metric, or replaces the payload of the stored one.
    async fn upsert(&self, metric: Metric) -> Result<()>;

    /// Applies [`Repository::upsert`] to each metric in order. A failure part
    /// way through is reported as [`StorageError::PartialBatch`].
    async fn upsert_batch(&self, metrics: Vec<Metric>) -> Result<()>;

    /// Returns the stored metric with its payload.
    async fn get(&self, key: &MetricKey) -> Result<Metric>;

    /// Snapshot of every stored metric, in a stable order.
    async fn get_batch(&self) -> Result<Vec<Metric>>;

    /// Removes the metric; [`StorageError::NotFound`] if it is absent.
    async fn delete(&self, key: &MetricKey) -> Result<()>;

    /// Persists the current state to the durable medium.
    async fn flush(&self) -> Result<()>;

    /// Repopulates the store from the durable medium.
    async fn restore(&self) -> Result<()>;

    /// Whether the backing medium is reachable.
    async fn health(&self) -> bool;

    /// Releases medium-owned resources. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Selects and configures the backing created by [`open_repository`].
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// SQL connection string; selects [`SqlStore`] when non-empty.
    pub database_dsn: String,
    /// JSON file path; selects [`FileStore`] when non-empty and no DSN is set.
    pub store_file: String,
    /// Period of background flushes; zero flushes on every mutation.
    pub store_interval: Duration,
    /// Load persisted metrics when the backing opens.
    pub restore: bool,
}

/// Opens the backing described by `config`.
///
/// Must be called inside a Tokio runtime: durable backings with a non-zero
/// interval spawn their flusher task here.
pub async fn open_repository(config: &StorageConfig) -> Result<Arc<dyn Repository>> {
    if !config.database_dsn.is_empty() {
        let store =
            SqlStore::connect(&config.database_dsn, config.store_interval, config.restore).await?;
        return Ok(Arc::new(store));
    }
    if !config.store_file.is_empty() {
        let store =
            FileStore::open(&config.store_file, config.store_interval, config.restore).await?;
        return Ok(Arc::new(store));
    }
    tracing::info!("No durable storage configured, metrics are kept in memory only");
    Ok(Arc::new(MemStore::new()))
}
