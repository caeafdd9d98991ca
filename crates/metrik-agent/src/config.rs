use crate::reporter::ReportShape;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Server address, with or without an `http://` scheme.
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub report_shape: ReportShape,
    /// HMAC key for metric hashes; empty disables signing.
    #[serde(default)]
    pub sign_key: String,
    /// Server public key (PEM); enables body encryption when set.
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
}

fn default_address() -> String {
    "localhost:8080".to_string()
}

fn default_report_interval() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    2
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            report_interval_secs: default_report_interval(),
            poll_interval_secs: default_poll_interval(),
            report_shape: ReportShape::default(),
            sign_key: String::new(),
            public_key_path: None,
        }
    }
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
