use metrik_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    #[serde(default = "default_address")]
    pub address: String,
    /// Seconds between background flushes; `0` persists every write.
    #[serde(default = "default_store_interval")]
    pub store_interval_secs: u64,
    /// Load persisted metrics on startup.
    #[serde(default = "default_restore")]
    pub restore: bool,
    /// PostgreSQL or SQLite DSN; takes precedence over `store_file`.
    #[serde(default)]
    pub database_dsn: String,
    #[serde(default = "default_store_file")]
    pub store_file: String,
    /// HMAC key; empty disables hash verification.
    #[serde(default)]
    pub sign_key: String,
    /// Private key (PEM) for encrypted request bodies.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_store_interval() -> u64 {
    300
}

fn default_restore() -> bool {
    true
}

fn default_store_file() -> String {
    "/tmp/metrics-db.json".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            store_interval_secs: default_store_interval(),
            restore: default_restore(),
            database_dsn: String::new(),
            store_file: default_store_file(),
            sign_key: String::new(),
            private_key_path: None,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            database_dsn: self.database_dsn.clone(),
            store_file: self.store_file.clone(),
            store_interval: Duration::from_secs(self.store_interval_secs),
            restore: self.restore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_file_store() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.address, "0.0.0.0:8080");
        assert!(config.restore);

        let storage = config.storage_config();
        assert_eq!(storage.store_file, "/tmp/metrics-db.json");
        assert_eq!(storage.store_interval, Duration::from_secs(300));
        assert!(storage.database_dsn.is_empty());
    }

    #[test]
    fn zero_interval_and_dsn_are_passed_through() {
        let config: ServerConfig = toml::from_str(
            r#"
            store_interval_secs = 0
            restore = false
            database_dsn = "postgres://metrik@localhost/metrik"
            sign_key = "s3cret"
            "#,
        )
        .unwrap();
        let storage = config.storage_config();
        assert!(storage.store_interval.is_zero());
        assert!(!storage.restore);
        assert_eq!(storage.database_dsn, "postgres://metrik@localhost/metrik");
        assert_eq!(config.sign_key, "s3cret");
    }
}
