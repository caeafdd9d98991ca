use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Spawns a task that calls `flush` every `period` until `cancel` fires.
///
/// Failures are logged and the next tick retries. The final flush on close is
/// the owner's responsibility.
pub fn spawn_flusher<F, Fut>(
    component: &'static str,
    period: Duration,
    cancel: CancellationToken,
    flush: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let span = tracing::info_span!("flusher", component);
    tokio::spawn(
        async move {
            tracing::info!(period_ms = period.as_millis() as u64, "Periodic flush started");
            let mut tick = interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Periodic flush stopped");
                        break;
                    }
                    _ = tick.tick() => {
                        match flush().await {
                            Ok(()) => tracing::debug!("Flushed"),
                            Err(e) => tracing::error!(error = %e, "Periodic flush failed"),
                        }
                    }
                }
            }
        }
        .instrument(span),
    )
}
