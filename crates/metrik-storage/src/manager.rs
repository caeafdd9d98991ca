use crate::error::Result;
use crate::Repository;
use async_trait::async_trait;
use metrik_common::{Metric, MetricKey};
use std::sync::Arc;

/// Signing gate in front of a shared repository.
///
/// With a non-empty key, writes are accepted only when the incoming hash
/// matches the HMAC of the metric, and reads come back with the hash
/// recomputed under the key. With an empty key it passes everything through
/// and strips hashes from reads.
///
/// The wrapped repository belongs to whoever opened it; [`Repository::close`]
/// on the manager leaves it open.
pub struct MetricsManager {
    repo: Arc<dyn Repository>,
    key: String,
}

impl MetricsManager {
    pub fn new(repo: Arc<dyn Repository>, key: impl Into<String>) -> Self {
        Self {
            repo,
            key: key.into(),
        }
    }

    pub fn signing_enabled(&self) -> bool {
        !self.key.is_empty()
    }

    fn stamp(&self, metric: Metric) -> Result<Metric> {
        Ok(metric.signed(&self.key)?)
    }
}

#[async_trait]
impl Repository for MetricsManager {
    async fn upsert(&self, metric: Metric) -> Result<()> {
        metric.verify(&self.key)?;
        self.repo.upsert(metric).await
    }

    async fn upsert_batch(&self, metrics: Vec<Metric>) -> Result<()> {
        for metric in &metrics {
            metric.verify(&self.key)?;
        }
        self.repo.upsert_batch(metrics).await
    }

    async fn get(&self, key: &MetricKey) -> Result<Metric> {
        self.stamp(self.repo.get(key).await?)
    }

    async fn get_batch(&self) -> Result<Vec<Metric>> {
        self.repo
            .get_batch()
            .await?
            .into_iter()
            .map(|m| self.stamp(m))
            .collect()
    }

    async fn delete(&self, key: &MetricKey) -> Result<()> {
        self.repo.delete(key).await
    }

    async fn flush(&self) -> Result<()> {
        self.repo.flush().await
    }

    async fn restore(&self) -> Result<()> {
        self.repo.restore().await
    }

    async fn health(&self) -> bool {
        self.repo.health().await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
