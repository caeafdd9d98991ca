use anyhow::Result;
use metrik_agent::{Agent, AgentConfig};
use metrik_collector::alloc::CountingAllocator;
use metrik_common::crypto::PayloadEncryptor;
use metrik_storage::{MemStore, Repository};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("metrik=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = AgentConfig::load(&config_path)?;
    tracing::info!(
        address = %config.address,
        shape = %config.report_shape,
        "metrik-agent starting"
    );

    let repo: Arc<dyn Repository> = Arc::new(MemStore::new());
    let mut builder = Agent::builder()
        .repository(repo)
        .address(config.address.clone())
        .report_shape(config.report_shape)
        .poll_interval(config.poll_interval())
        .report_interval(config.report_interval())
        .sign_key(config.sign_key.clone());
    if let Some(path) = &config.public_key_path {
        builder = builder.encryptor(PayloadEncryptor::load(path)?);
        tracing::info!(path = %path.display(), "Payload encryption enabled");
    }
    let agent = builder.build()?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down gracefully");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    agent.run(cancel).await;
    Ok(())
}
