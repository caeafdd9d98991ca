use metrik_common::{MetricError, MetricKey};

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use metrik_common::{MetricKey, MetricKind};
/// use metrik_storage::error::StorageError;
///
/// let err = StorageError::NotFound(MetricKey {
///     kind: MetricKind::Gauge,
///     id: "Temp".to_string(),
/// });
/// assert!(err.to_string().contains("gauge/Temp"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No metric with this `(type, id)` is stored.
    #[error("Storage: metric {0} not found")]
    NotFound(MetricKey),

    /// A metric failed validation or signature verification.
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// A file backing was configured without a path.
    #[error("Storage: file store requires a non-empty path")]
    InvalidFilePath,

    /// A SQL backing was configured without a usable DSN.
    #[error("Storage: invalid database DSN: {0}")]
    InvalidDsn(String),

    /// The SQL driver could not reach the database.
    #[error("Storage: database connection failed: {0}")]
    FailedConnection(String),

    /// A batch was rejected part way through; the first `applied` metrics were stored.
    #[error("Storage: batch stopped after {applied} of {total} metrics: {source}")]
    PartialBatch {
        applied: usize,
        total: usize,
        #[source]
        source: Box<StorageError>,
    },

    /// The backing medium was already closed.
    #[error("Storage: repository is closed")]
    Closed,

    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage: database error: {0}")]
    Database(sea_orm::DbErr),
}

impl StorageError {
    /// The error that decided the outcome, looking through partial-batch wrappers.
    pub fn root(&self) -> &StorageError {
        match self {
            StorageError::PartialBatch { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<sea_orm::DbErr> for StorageError {
    fn from(e: sea_orm::DbErr) -> Self {
        match e {
            sea_orm::DbErr::Conn(_) | sea_orm::DbErr::ConnectionAcquire(_) => {
                StorageError::FailedConnection(e.to_string())
            }
            other => StorageError::Database(other),
        }
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
