/// Errors produced while building, parsing, or signing a [`Metric`](crate::metric::Metric).
///
/// # Examples
///
/// ```rust
/// use metrik_common::error::MetricError;
///
/// let err = MetricError::UnknownType("fridge".to_string());
/// assert!(err.to_string().contains("fridge"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricError {
    /// The type token is neither `gauge` nor `counter`.
    #[error("Metric: unknown metric type '{0}'")]
    UnknownType(String),

    /// The metric identifier is empty.
    #[error("Metric: metric id must not be empty")]
    InvalidId,

    /// The type token is missing.
    #[error("Metric: metric type must not be empty")]
    InvalidType,

    /// The payload could not be parsed, is missing, or does not fit the metric type.
    #[error("Metric: invalid value: {0}")]
    InvalidValue(String),

    /// A request body could not be decoded into a metric.
    #[error("Metric: invalid JSON: {0}")]
    InvalidJson(String),

    /// The integrity tag does not match the one computed with the configured key.
    #[error("Metric: signature mismatch for '{0}'")]
    SignFailed(String),

    /// RSA key loading, encryption or decryption failed.
    #[error("Metric: crypto error: {0}")]
    Crypto(String),
}

/// Convenience `Result` alias for metric operations.
pub type Result<T> = std::result::Result<T, MetricError>;
