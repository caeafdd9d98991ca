use crate::error::AgentError;
use crate::reporter::{ReportShape, Reporter};
use metrik_collector::poll::POLL_COUNT;
use metrik_collector::{Collector, Scanner};
use metrik_common::crypto::PayloadEncryptor;
use metrik_common::{MetricKey, MetricKind};
use metrik_storage::{Repository, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Named-setter construction of an [`Agent`].
///
/// Repository, address and report shape are required; everything else has a
/// default.
#[derive(Default)]
pub struct AgentBuilder {
    repo: Option<Arc<dyn Repository>>,
    address: Option<String>,
    shape: Option<ReportShape>,
    poll_interval: Option<Duration>,
    report_interval: Option<Duration>,
    sign_key: String,
    encryptor: Option<PayloadEncryptor>,
    collectors: Option<Vec<Box<dyn Collector>>>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository(mut self, repo: Arc<dyn Repository>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn report_shape(mut self, shape: ReportShape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn poll_interval(mut self, period: Duration) -> Self {
        self.poll_interval = Some(period);
        self
    }

    pub fn report_interval(mut self, period: Duration) -> Self {
        self.report_interval = Some(period);
        self
    }

    pub fn sign_key(mut self, key: impl Into<String>) -> Self {
        self.sign_key = key.into();
        self
    }

    pub fn encryptor(mut self, encryptor: PayloadEncryptor) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Replaces the standard collector set.
    pub fn collectors(mut self, collectors: Vec<Box<dyn Collector>>) -> Self {
        self.collectors = Some(collectors);
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let repo = self.repo.ok_or(AgentError::MissingRepository)?;
        let address = self
            .address
            .filter(|a| !a.trim().is_empty())
            .ok_or(AgentError::MissingAddress)?;
        let shape = self.shape.ok_or(AgentError::MissingReportShape)?;

        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(AgentError::ZeroInterval("poll"));
        }
        let report_interval = self.report_interval.unwrap_or(DEFAULT_REPORT_INTERVAL);
        if report_interval.is_zero() {
            return Err(AgentError::ZeroInterval("report"));
        }

        if shape == ReportShape::Url && !self.sign_key.is_empty() {
            tracing::warn!("URL-shaped reports carry no hash; a signing server will reject them");
        }

        let scanner = match self.collectors {
            Some(collectors) => Scanner::with_collectors(Arc::clone(&repo), collectors),
            None => Scanner::new(Arc::clone(&repo)),
        };
        let reporter = Reporter::new(Arc::clone(&repo), &address, shape, report_interval)?
            .with_sign_key(self.sign_key)
            .with_encryptor(self.encryptor);

        Ok(Agent {
            repo,
            scanner,
            reporter,
            poll_interval,
            report_interval,
        })
    }
}

/// Runs the sample and report loops against a shared repository.
///
/// The loops never talk to each other directly. After every successful
/// report the `PollCount` counter is deleted, so the next sample starts it
/// again at 1.
pub struct Agent {
    repo: Arc<dyn Repository>,
    scanner: Scanner,
    reporter: Reporter,
    poll_interval: Duration,
    report_interval: Duration,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Runs both loops until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let Agent {
            repo,
            scanner,
            reporter,
            poll_interval,
            report_interval,
        } = self;

        tracing::info!(
            poll_ms = poll_interval.as_millis() as u64,
            report_ms = report_interval.as_millis() as u64,
            server = %reporter.base_url(),
            shape = %reporter.shape(),
            "Starting agent loops"
        );

        let sampler = tokio::spawn(
            sample_loop(scanner, poll_interval, cancel.clone())
                .instrument(tracing::info_span!("sample_loop")),
        );
        let shipper = tokio::spawn(
            report_loop(reporter, repo, report_interval, cancel)
                .instrument(tracing::info_span!("report_loop")),
        );

        let (sampled, shipped) = tokio::join!(sampler, shipper);
        for (name, outcome) in [("sample", sampled), ("report", shipped)] {
            if let Err(e) = outcome {
                tracing::error!(loop_name = name, error = %e, "Agent loop ended abnormally");
            }
        }
        tracing::info!("Agent stopped");
    }
}

async fn sample_loop(mut scanner: Scanner, period: Duration, cancel: CancellationToken) {
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    outcome = scanner.scan() => {
                        if let Err(e) = outcome {
                            tracing::warn!(error = %e, "Sample failed");
                        }
                    }
                }
            }
        }
    }
}

async fn report_loop(
    reporter: Reporter,
    repo: Arc<dyn Repository>,
    period: Duration,
    cancel: CancellationToken,
) {
    let poll_count = MetricKey {
        kind: MetricKind::Counter,
        id: POLL_COUNT.to_string(),
    };
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => break,
                    outcome = reporter.report() => outcome,
                };
                match outcome {
                    Ok(count) => {
                        tracing::info!(count, "Report delivered");
                        match repo.delete(&poll_count).await {
                            Ok(()) | Err(StorageError::NotFound(_)) => {}
                            Err(e) => tracing::warn!(error = %e, "Failed to reset poll count"),
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Report failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrik_storage::MemStore;

    fn repo() -> Arc<dyn Repository> {
        Arc::new(MemStore::new())
    }

    #[test]
    fn build_requires_repository_address_and_shape() {
        let missing_repo = Agent::builder()
            .address("localhost:8080")
            .report_shape(ReportShape::Url)
            .build();
        assert!(matches!(missing_repo, Err(AgentError::MissingRepository)));

        let missing_address = Agent::builder()
            .repository(repo())
            .report_shape(ReportShape::Url)
            .build();
        assert!(matches!(missing_address, Err(AgentError::MissingAddress)));

        let missing_shape = Agent::builder()
            .repository(repo())
            .address("localhost:8080")
            .build();
        assert!(matches!(missing_shape, Err(AgentError::MissingReportShape)));
    }

    #[test]
    fn build_rejects_zero_intervals() {
        let agent = Agent::builder()
            .repository(repo())
            .address("localhost:8080")
            .report_shape(ReportShape::Json)
            .poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(agent, Err(AgentError::ZeroInterval("poll"))));
    }

    #[tokio::test]
    async fn run_returns_promptly_on_cancel() {
        let agent = Agent::builder()
            .repository(repo())
            .address("127.0.0.1:9")
            .report_shape(ReportShape::BatchJson)
            .collectors(Vec::new())
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(agent.run(cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
