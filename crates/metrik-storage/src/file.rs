use crate::error::{Result, StorageError};
use crate::flusher::spawn_flusher;
use crate::memory::MemStore;
use crate::Repository;
use async_trait::async_trait;
use metrik_common::{Metric, MetricKey};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct FileInner {
    mem: MemStore,
    path: PathBuf,
    /// Serializes writers of the snapshot file.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileInner {
    async fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.mem.snapshot();
        let body = serde_json::to_vec_pretty(&snapshot)?;

        // Write beside the target, then rename over it.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), count = snapshot.len(), "Snapshot written");
        Ok(())
    }

    async fn restore(&self) -> Result<()> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot to restore");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let metrics = parse_snapshot(&content, &self.path);
        let count = metrics.len();
        for metric in metrics {
            if let Err(e) = self.mem.put(metric) {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Skipping invalid stored metric"
                );
            }
        }
        tracing::info!(path = %self.path.display(), count, "Restored metrics from file");
        Ok(())
    }
}

/// Accepts a single JSON array or one JSON object per line.
fn parse_snapshot(content: &str, path: &Path) -> Vec<Metric> {
    if content.trim_start().starts_with('[') {
        match serde_json::from_str::<Vec<serde_json::Value>>(content) {
            Ok(values) => {
                return values
                    .into_iter()
                    .filter_map(|v| match serde_json::from_value::<Metric>(v) {
                        Ok(m) => Some(m),
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "Skipping malformed entry"
                            );
                            None
                        }
                    })
                    .collect();
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Snapshot is not a valid array, reading it line by line"
                );
            }
        }
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Metric>(line) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = n + 1,
                    error = %e,
                    "Skipping malformed line"
                );
                None
            }
        })
        .collect()
}

/// [`MemStore`] persisted as JSON at `path`.
///
/// With a zero interval every mutation rewrites the file before returning;
/// otherwise a background task flushes once per interval.
pub struct FileStore {
    inner: Arc<FileInner>,
    sync_writes: bool,
    cancel: CancellationToken,
    flusher: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl FileStore {
    pub async fn open(path: impl AsRef<Path>, interval: Duration, restore: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(StorageError::InvalidFilePath);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let inner = Arc::new(FileInner {
            mem: MemStore::new(),
            path: path.to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        });
        if restore {
            inner.restore().await?;
        }

        let cancel = CancellationToken::new();
        let sync_writes = interval.is_zero();
        let flusher = if sync_writes {
            None
        } else {
            let inner = Arc::clone(&inner);
            Some(spawn_flusher("file", interval, cancel.clone(), move || {
                let inner = Arc::clone(&inner);
                async move { inner.flush().await }
            }))
        };

        tracing::info!(path = %path.display(), sync_writes, "Opened file store");
        Ok(Self {
            inner,
            sync_writes,
            cancel,
            flusher: Mutex::new(flusher),
            closed: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn after_write(&self) -> Result<()> {
        if self.sync_writes {
            self.inner.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for FileStore {
    async fn upsert(&self, metric: Metric) -> Result<()> {
        self.inner.mem.put(metric)?;
        self.after_write().await
    }

    async fn upsert_batch(&self, metrics: Vec<Metric>) -> Result<()> {
        let outcome = self.inner.mem.put_all(metrics);
        // Whatever was applied is persisted, even when the batch stopped early.
        self.after_write().await?;
        outcome
    }

    async fn get(&self, key: &MetricKey) -> Result<Metric> {
        self.inner.mem.fetch(key)
    }

    async fn get_batch(&self) -> Result<Vec<Metric>> {
        Ok(self.inner.mem.snapshot())
    }

    async fn delete(&self, key: &MetricKey) -> Result<()> {
        self.inner.mem.remove(key)?;
        self.after_write().await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    async fn restore(&self) -> Result<()> {
        self.inner.restore().await
    }

    async fn health(&self) -> bool {
        tokio::fs::try_exists(&self.inner.path)
            .await
            .unwrap_or(false)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();
        let handle = self
            .flusher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "File flusher task ended abnormally");
            }
        }
        self.inner.flush().await?;
        tracing::info!(path = %self.inner.path.display(), "Closed file store");
        Ok(())
    }
}
