use anyhow::Result;
use metrik_server::app;
use metrik_server::config::ServerConfig;
use metrik_server::state::AppState;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("metrik=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = ServerConfig::load(&config_path)?;
    tracing::info!(
        address = %config.address,
        store_interval_secs = config.store_interval_secs,
        restore = config.restore,
        signing = !config.sign_key.is_empty(),
        "metrik-server starting"
    );

    let state = AppState::open(config).await?;
    let listener = tokio::net::TcpListener::bind(state.config.address.as_str()).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

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

    let served = axum::serve(listener, app::build_http_app(state.clone()))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await;

    // Close even when serving failed so the last writes reach the medium.
    if let Err(e) = state.backing.close().await {
        tracing::error!(error = %e, "Failed to close storage");
    }
    tracing::info!(uptime_secs = state.uptime_secs(), "metrik-server stopped");
    served?;
    Ok(())
}
