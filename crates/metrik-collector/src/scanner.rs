use crate::cpu::CpuCollector;
use crate::memory::MemoryCollector;
use crate::poll::PollCounter;
use crate::random::RandomCollector;
use crate::runtime::RuntimeCollector;
use crate::Collector;
use metrik_storage::{Repository, Result};
use std::sync::Arc;

/// Runs every registered collector and stores the combined sample.
pub struct Scanner {
    collectors: Vec<Box<dyn Collector>>,
    repo: Arc<dyn Repository>,
}

impl Scanner {
    /// Scanner with the standard set: random value, runtime, host memory,
    /// CPU and poll count.
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self::with_collectors(
            repo,
            vec![
                Box::new(RandomCollector::new()),
                Box::new(RuntimeCollector::new()),
                Box::new(MemoryCollector::new()),
                Box::new(CpuCollector::new()),
                Box::new(PollCounter::new()),
            ],
        )
    }

    pub fn with_collectors(repo: Arc<dyn Repository>, collectors: Vec<Box<dyn Collector>>) -> Self {
        Self { collectors, repo }
    }

    /// Samples all collectors and writes the result in one batch.
    ///
    /// A failing collector is logged and left out of the sample. Returns the
    /// number of metrics written.
    pub async fn scan(&mut self) -> Result<usize> {
        let mut sample = Vec::new();
        for collector in &mut self.collectors {
            match collector.collect() {
                Ok(metrics) => sample.extend(metrics),
                Err(e) => {
                    tracing::warn!(collector = collector.name(), error = %e, "Collection failed")
                }
            }
        }

        let count = sample.len();
        self.repo.upsert_batch(sample).await?;
        tracing::debug!(count, "Sample stored");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::POLL_COUNT;
    use crate::runtime::RUNTIME_GAUGES;
    use metrik_common::{Metric, MetricKey, MetricKind};
    use metrik_storage::MemStore;

    struct Broken;

    impl Collector for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn collect(&mut self) -> anyhow::Result<Vec<Metric>> {
            anyhow::bail!("sensor offline")
        }
    }

    #[tokio::test]
    async fn standard_scan_stores_full_sample() {
        let repo = Arc::new(MemStore::new());
        let mut scanner = Scanner::new(repo.clone());
        let count = scanner.scan().await.unwrap();
        assert_eq!(count, repo.len());

        let ids: Vec<String> = repo.snapshot().into_iter().map(|m| m.id).collect();
        for name in RUNTIME_GAUGES
            .iter()
            .chain(&["RandomValue", "TotalMemory", "FreeMemory", "CPUutilization1", POLL_COUNT])
        {
            assert!(ids.iter().any(|id| id == name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn failing_collector_does_not_abort_sample() {
        let repo = Arc::new(MemStore::new());
        let mut scanner = Scanner::with_collectors(
            repo.clone(),
            vec![
                Box::new(Broken),
                Box::new(RuntimeCollector::new()),
                Box::new(PollCounter::new()),
            ],
        );
        assert_eq!(scanner.scan().await.unwrap(), RUNTIME_GAUGES.len() + 1);
    }

    #[tokio::test]
    async fn poll_count_is_one_after_every_scan() {
        let repo = Arc::new(MemStore::new());
        let mut scanner =
            Scanner::with_collectors(repo.clone(), vec![Box::new(PollCounter::new())]);
        scanner.scan().await.unwrap();
        scanner.scan().await.unwrap();

        let key = MetricKey {
            kind: MetricKind::Counter,
            id: POLL_COUNT.to_string(),
        };
        assert_eq!(repo.fetch(&key).unwrap().delta(), Some(1));
    }
}
