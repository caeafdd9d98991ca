use crate::error::{Result, StorageError};
use crate::Repository;
use async_trait::async_trait;
use metrik_common::{Metric, MetricKey};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory repository keyed by `(type, id)`.
///
/// A single mutex guards the collection, so every operation is linearizable
/// per key. Iteration follows key order, which keeps snapshots stable.
#[derive(Default)]
pub struct MemStore {
    metrics: Mutex<BTreeMap<MetricKey, Metric>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the collection, recovering from a poisoned Mutex if necessary.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<MetricKey, Metric>> {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put(&self, metric: Metric) -> Result<()> {
        metric.validate()?;
        // Counters are replaced like gauges; accumulation is the caller's job.
        self.lock().insert(metric.key(), metric);
        Ok(())
    }

    pub fn put_all(&self, metrics: Vec<Metric>) -> Result<()> {
        let total = metrics.len();
        let mut map = self.lock();
        for (applied, metric) in metrics.into_iter().enumerate() {
            if let Err(e) = metric.validate() {
                return Err(StorageError::PartialBatch {
                    applied,
                    total,
                    source: Box::new(e.into()),
                });
            }
            map.insert(metric.key(), metric);
        }
        Ok(())
    }

    pub fn fetch(&self, key: &MetricKey) -> Result<Metric> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    pub fn snapshot(&self) -> Vec<Metric> {
        self.lock().values().cloned().collect()
    }

    pub fn remove(&self, key: &MetricKey) -> Result<Metric> {
        self.lock()
            .remove(key)
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl Repository for MemStore {
    async fn upsert(&self, metric: Metric) -> Result<()> {
        self.put(metric)
    }

    async fn upsert_batch(&self, metrics: Vec<Metric>) -> Result<()> {
        self.put_all(metrics)
    }

    async fn get(&self, key: &MetricKey) -> Result<Metric> {
        self.fetch(key)
    }

    async fn get_batch(&self) -> Result<Vec<Metric>> {
        Ok(self.snapshot())
    }

    async fn delete(&self, key: &MetricKey) -> Result<()> {
        self.remove(key).map(|_| ())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn restore(&self) -> Result<()> {
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
