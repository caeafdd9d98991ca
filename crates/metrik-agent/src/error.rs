use metrik_common::MetricError;
use metrik_storage::StorageError;

/// Errors raised while shipping metrics to the server.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The server answered with a status other than 200.
    #[error("Report: {url} responded with status {status}")]
    ReportFailed { url: String, status: u16 },

    /// The request could not be sent or its response read.
    #[error("Report: request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Signing or encrypting a metric failed.
    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("Report: failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised when assembling an [`crate::Agent`].
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent: repository is not set")]
    MissingRepository,

    #[error("Agent: server address is not set")]
    MissingAddress,

    #[error("Agent: report shape is not set")]
    MissingReportShape,

    #[error("Agent: {0} interval must be greater than zero")]
    ZeroInterval(&'static str),

    #[error(transparent)]
    Report(#[from] ReportError),
}
