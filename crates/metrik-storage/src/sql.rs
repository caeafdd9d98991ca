use crate::error::{Result, StorageError};
use crate::flusher::spawn_flusher;
use crate::memory::MemStore;
use crate::Repository;
use async_trait::async_trait;
use metrik_common::{Metric, MetricError, MetricKey, MetricKind, MetricValue};
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult, Statement,
    TransactionTrait, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const METRICS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runtimeMetrics (
    id    SERIAL,
    name  VARCHAR(50) PRIMARY KEY,
    type  VARCHAR(50),
    delta BIGINT,
    value DOUBLE PRECISION
)";

const SELECT_METRICS: &str = "SELECT name, type, delta, value FROM runtimeMetrics ORDER BY name";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

/// Positional placeholder `n` (1-based) in the backend's dialect.
fn placeholder(backend: DatabaseBackend, n: usize) -> String {
    match backend {
        DatabaseBackend::Postgres => format!("${n}"),
        _ => "?".to_string(),
    }
}

fn upsert_gauge_sql(backend: DatabaseBackend) -> String {
    let p = |n| placeholder(backend, n);
    format!(
        "INSERT INTO runtimeMetrics (name, type, delta, value) VALUES ({}, {}, NULL, {}) \
         ON CONFLICT (name) DO UPDATE \
         SET type = excluded.type, delta = NULL, value = excluded.value",
        p(1),
        p(2),
        p(3)
    )
}

fn upsert_counter_sql(backend: DatabaseBackend) -> String {
    let p = |n| placeholder(backend, n);
    format!(
        "INSERT INTO runtimeMetrics (name, type, delta, value) VALUES ({}, {}, {}, NULL) \
         ON CONFLICT (name) DO UPDATE \
         SET type = excluded.type, delta = excluded.delta, value = NULL",
        p(1),
        p(2),
        p(3)
    )
}

fn delete_sql(backend: DatabaseBackend) -> String {
    format!(
        "DELETE FROM runtimeMetrics WHERE name = {}",
        placeholder(backend, 1)
    )
}

/// Row key for `key`. The table is keyed by `name` alone, so the type is
/// folded in to keep a gauge and a counter with the same id apart.
fn row_name(key: &MetricKey) -> String {
    format!("{}/{}", key.kind, key.id)
}

fn row_to_metric(row: &QueryResult) -> Result<Metric> {
    let name: String = row.try_get("", "name")?;
    let kind: Option<String> = row.try_get("", "type")?;
    let kind: MetricKind = kind.unwrap_or_default().parse()?;
    // Rows written with a bare id are still readable.
    let id = name
        .strip_prefix(kind.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
        .map(str::to_string)
        .unwrap_or(name);
    let missing = |column: &str| {
        MetricError::InvalidValue(format!("{kind} '{id}' has NULL {column}"))
    };
    let metric = match kind {
        MetricKind::Gauge => {
            let value: Option<f64> = row.try_get("", "value")?;
            Metric::gauge(id.clone(), value.ok_or_else(|| missing("value"))?)
        }
        MetricKind::Counter => {
            let delta: Option<i64> = row.try_get("", "delta")?;
            Metric::counter(id.clone(), delta.ok_or_else(|| missing("delta"))?)
        }
    };
    Ok(metric)
}

struct SqlInner {
    mem: MemStore,
    backend: DatabaseBackend,
    conn: RwLock<Option<DatabaseConnection>>,
    gauge_sql: String,
    counter_sql: String,
}

impl SqlInner {
    async fn connection(&self) -> Result<DatabaseConnection> {
        self.conn.read().await.clone().ok_or(StorageError::Closed)
    }

    async fn flush(&self) -> Result<()> {
        let db = self.connection().await?;
        let snapshot = self.mem.snapshot();

        let txn = db.begin().await?;
        for metric in &snapshot {
            let (sql, payload) = match metric.value {
                MetricValue::Gauge(v) => (&self.gauge_sql, Value::from(v)),
                MetricValue::Counter(d) => (&self.counter_sql, Value::from(d)),
            };
            let stmt = Statement::from_sql_and_values(
                self.backend,
                sql.as_str(),
                [
                    Value::from(row_name(&metric.key())),
                    Value::from(metric.kind().as_str()),
                    payload,
                ],
            );
            txn.execute(stmt).await?;
        }
        // Dropping an uncommitted transaction rolls it back.
        txn.commit().await?;

        tracing::debug!(count = snapshot.len(), "Snapshot written to database");
        Ok(())
    }

    async fn restore(&self) -> Result<()> {
        let db = self.connection().await?;
        let rows = db
            .query_all(Statement::from_string(self.backend, SELECT_METRICS))
            .await?;
        let mut restored = 0usize;
        for row in &rows {
            match row_to_metric(row).and_then(|m| self.mem.put(m)) {
                Ok(()) => restored += 1,
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable metric row"),
            }
        }
        tracing::info!(count = restored, "Restored metrics from database");
        Ok(())
    }
}

/// [`MemStore`] persisted to the `runtimeMetrics` table.
///
/// Reads are served from memory. Durability comes from [`Repository::flush`],
/// which upserts the whole snapshot inside one transaction; a zero interval
/// flushes after every mutation, otherwise a background task flushes once per
/// interval. Deletes are applied to the table immediately.
///
/// Rows are named `{type}/{id}`, so a gauge and a counter sharing an id get
/// separate rows.
pub struct SqlStore {
    inner: Arc<SqlInner>,
    sync_writes: bool,
    cancel: CancellationToken,
    flusher: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SqlStore {
    /// Connects to `dsn` (PostgreSQL or SQLite), ensures the table exists and,
    /// when `restore` is set, loads the stored rows.
    pub async fn connect(dsn: &str, interval: Duration, restore: bool) -> Result<Self> {
        if dsn.trim().is_empty() {
            return Err(StorageError::InvalidDsn("empty DSN".to_string()));
        }
        let db = Database::connect(dsn)
            .await
            .map_err(|e| StorageError::FailedConnection(e.to_string()))?;
        let backend = db.get_database_backend();
        if backend == DatabaseBackend::MySql {
            return Err(StorageError::InvalidDsn(
                "only PostgreSQL and SQLite are supported".to_string(),
            ));
        }
        db.execute_unprepared(METRICS_SCHEMA).await?;

        let inner = Arc::new(SqlInner {
            mem: MemStore::new(),
            backend,
            conn: RwLock::new(Some(db)),
            gauge_sql: upsert_gauge_sql(backend),
            counter_sql: upsert_counter_sql(backend),
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
            Some(spawn_flusher("sql", interval, cancel.clone(), move || {
                let inner = Arc::clone(&inner);
                async move { inner.flush().await }
            }))
        };

        tracing::info!(backend = ?backend, sync_writes, "Opened SQL store");
        Ok(Self {
            inner,
            sync_writes,
            cancel,
            flusher: Mutex::new(flusher),
            closed: AtomicBool::new(false),
        })
    }

    async fn after_write(&self) -> Result<()> {
        if self.sync_writes {
            self.inner.flush().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for SqlStore {
    async fn upsert(&self, metric: Metric) -> Result<()> {
        self.inner.mem.put(metric)?;
        self.after_write().await
    }

    async fn upsert_batch(&self, metrics: Vec<Metric>) -> Result<()> {
        let outcome = self.inner.mem.put_all(metrics);
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
        let db = self.inner.connection().await?;
        let stmt = Statement::from_sql_and_values(
            self.inner.backend,
            delete_sql(self.inner.backend),
            [Value::from(row_name(key))],
        );
        db.execute(stmt).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    async fn restore(&self) -> Result<()> {
        self.inner.restore().await
    }

    async fn health(&self) -> bool {
        let Ok(db) = self.inner.connection().await else {
            return false;
        };
        matches!(
            tokio::time::timeout(HEALTH_TIMEOUT, db.ping()).await,
            Ok(Ok(()))
        )
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
                tracing::warn!(error = %e, "SQL flusher task ended abnormally");
            }
        }

        let flushed = self.inner.flush().await;
        if let Some(db) = self.inner.conn.write().await.take() {
            db.close().await?;
        }
        tracing::info!("Closed SQL store");
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_follow_backend_dialect() {
        assert!(upsert_gauge_sql(DatabaseBackend::Postgres).contains("VALUES ($1, $2, NULL, $3)"));
        assert!(upsert_counter_sql(DatabaseBackend::Sqlite).contains("VALUES (?, ?, ?, NULL)"));
        assert_eq!(
            delete_sql(DatabaseBackend::Postgres),
            "DELETE FROM runtimeMetrics WHERE name = $1"
        );
    }
}
