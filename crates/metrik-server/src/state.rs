use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use metrik_common::crypto::PayloadDecryptor;
use metrik_storage::{open_repository, MetricsManager, Repository};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Signing gate used by every handler.
    pub repo: Arc<MetricsManager>,
    /// The backing behind `repo`; closed by the owner on shutdown.
    pub backing: Arc<dyn Repository>,
    pub decryptor: Option<Arc<PayloadDecryptor>>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(backing: Arc<dyn Repository>, config: ServerConfig) -> Self {
        let repo = Arc::new(MetricsManager::new(
            Arc::clone(&backing),
            config.sign_key.clone(),
        ));
        Self {
            repo,
            backing,
            decryptor: None,
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }

    pub fn with_decryptor(mut self, decryptor: PayloadDecryptor) -> Self {
        self.decryptor = Some(Arc::new(decryptor));
        self
    }

    /// Opens the configured backing and loads the private key, if any.
    pub async fn open(config: ServerConfig) -> anyhow::Result<Self> {
        let backing = open_repository(&config.storage_config()).await?;
        let decryptor = match &config.private_key_path {
            Some(path) => {
                let decryptor = PayloadDecryptor::load(path)?;
                tracing::info!(path = %path.display(), "Payload decryption enabled");
                Some(decryptor)
            }
            None => None,
        };

        let state = Self::new(backing, config);
        Ok(match decryptor {
            Some(d) => state.with_decryptor(d),
            None => state,
        })
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
