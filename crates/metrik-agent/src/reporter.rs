use crate::error::ReportError;
use metrik_common::crypto::{PayloadEncryptor, ENCRYPTION_HEADER, ENCRYPTION_SCHEME};
use metrik_common::{Metric, MetricError};
use metrik_storage::Repository;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const CONTENT_TYPE_TEXT: &str = "text/plain";
const CONTENT_TYPE_JSON: &str = "application/json";

/// How metrics are laid out on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportShape {
    /// One `POST /update/{type}/{id}/{value}` per metric.
    Url,
    /// One `POST /update` with a JSON object per metric.
    Json,
    /// A single `POST /updates` with a JSON array.
    #[default]
    BatchJson,
}

impl ReportShape {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportShape::Url => "url",
            ReportShape::Json => "json",
            ReportShape::BatchJson => "batch_json",
        }
    }
}

impl fmt::Display for ReportShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ReportShape::Url),
            "json" => Ok(ReportShape::Json),
            "batch_json" | "batch" => Ok(ReportShape::BatchJson),
            other => Err(format!("unknown report shape: {other}")),
        }
    }
}

/// One HTTP request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub encrypted: bool,
}

/// Prefixes `http://` when the address carries no scheme and drops a trailing slash.
pub fn normalize_address(address: &str) -> String {
    let addr = address.trim().trim_end_matches('/');
    if addr.contains("://") {
        return addr.to_string();
    }
    format!("http://{addr}")
}

/// Ships the repository's current contents to the server.
///
/// The repository is only read. Each request carries a deadline equal to the
/// timeout given at construction, normally the report interval.
pub struct Reporter {
    client: reqwest::Client,
    repo: Arc<dyn Repository>,
    base: String,
    shape: ReportShape,
    sign_key: String,
    encryptor: Option<PayloadEncryptor>,
}

impl Reporter {
    pub fn new(
        repo: Arc<dyn Repository>,
        address: &str,
        shape: ReportShape,
        timeout: Duration,
    ) -> Result<Self, ReportError> {
        let base = normalize_address(address);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ReportError::Transport {
                url: base.clone(),
                source,
            })?;
        Ok(Self {
            client,
            repo,
            base,
            shape,
            sign_key: String::new(),
            encryptor: None,
        })
    }

    pub fn with_sign_key(mut self, key: impl Into<String>) -> Self {
        self.sign_key = key.into();
        self
    }

    pub fn with_encryptor(mut self, encryptor: Option<PayloadEncryptor>) -> Self {
        self.encryptor = encryptor;
        self
    }

    pub fn shape(&self) -> ReportShape {
        self.shape
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Builds the requests for `metrics` in the configured shape.
    ///
    /// Metrics are signed first. JSON bodies are encrypted when an encryptor
    /// is configured; URL-shaped requests have no body to encrypt.
    pub fn encode(&self, metrics: Vec<Metric>) -> Result<Vec<Outgoing>, ReportError> {
        let metrics = metrics
            .into_iter()
            .map(|m| m.signed(&self.sign_key))
            .collect::<Result<Vec<_>, MetricError>>()?;

        match self.shape {
            ReportShape::Url => Ok(metrics
                .iter()
                .map(|m| {
                    let params = m.path_params();
                    Outgoing {
                        url: format!(
                            "{}/update/{}/{}/{}",
                            self.base, params["type"], params["id"], params["value"]
                        ),
                        body: Vec::new(),
                        content_type: CONTENT_TYPE_TEXT,
                        encrypted: false,
                    }
                })
                .collect()),
            ReportShape::Json => metrics
                .iter()
                .map(|m| -> Result<Outgoing, ReportError> {
                    self.json_request(format!("{}/update", self.base), serde_json::to_vec(m)?)
                })
                .collect(),
            ReportShape::BatchJson => {
                if metrics.is_empty() {
                    return Ok(Vec::new());
                }
                let body = serde_json::to_vec(&metrics)?;
                Ok(vec![self.json_request(format!("{}/updates", self.base), body)?])
            }
        }
    }

    fn json_request(&self, url: String, body: Vec<u8>) -> Result<Outgoing, ReportError> {
        let (body, encrypted) = match &self.encryptor {
            Some(enc) => (enc.encrypt(&body)?, true),
            None => (body, false),
        };
        Ok(Outgoing {
            url,
            body,
            content_type: CONTENT_TYPE_JSON,
            encrypted,
        })
    }

    async fn send(&self, out: Outgoing) -> Result<(), ReportError> {
        let mut request = self
            .client
            .post(out.url.as_str())
            .header("Content-Type", out.content_type)
            .body(out.body);
        if out.encrypted {
            request = request.header(ENCRYPTION_HEADER, ENCRYPTION_SCHEME);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ReportError::Transport {
                url: out.url.clone(),
                source,
            })?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ReportError::ReportFailed {
                url: out.url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Sends one report. Stops at the first failed request.
    ///
    /// Returns the number of metrics reported.
    pub async fn report(&self) -> Result<usize, ReportError> {
        let metrics = self.repo.get_batch().await?;
        let count = metrics.len();
        for out in self.encode(metrics)? {
            self.send(out).await?;
        }
        tracing::debug!(count, shape = %self.shape, "Metrics reported");
        Ok(count)
    }
}
