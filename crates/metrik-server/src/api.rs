use crate::logging::TraceId;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrik_common::{Metric, MetricError, MetricPayload};
use metrik_storage::{Repository, StorageError};
use std::fmt::Write;

/// Handler failure carrying the response status and a plaintext message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

pub fn metric_status(err: &MetricError) -> StatusCode {
    match err {
        MetricError::UnknownType(_) => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// HTTP status for a repository failure. Partial batches map by their cause.
pub fn storage_status(err: &StorageError) -> StatusCode {
    match err.root() {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Metric(e) => metric_status(e),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<MetricError> for ApiError {
    fn from(e: MetricError) -> Self {
        Self::new(metric_status(&e), e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        let status = storage_status(&e);
        if status.is_server_error() {
            tracing::error!(error = %e, "Repository failure");
        }
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn require_json(headers: &HeaderMap) -> ApiResult<()> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let mime = content_type.split(';').next().unwrap_or("").trim();
    if mime.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("expected application/json, got '{content_type}'"),
        ))
    }
}

fn parse_metric(body: &[u8]) -> Result<Metric, MetricError> {
    let payload: MetricPayload =
        serde_json::from_slice(body).map_err(|e| MetricError::InvalidJson(e.to_string()))?;
    Metric::try_from(payload)
}

fn parse_metrics(body: &[u8]) -> Result<Vec<Metric>, MetricError> {
    let payloads: Vec<MetricPayload> =
        serde_json::from_slice(body).map_err(|e| MetricError::InvalidJson(e.to_string()))?;
    payloads.into_iter().map(Metric::try_from).collect()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `POST /update/{type}/{id}/{value}`
async fn update_from_path(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path((kind, id, value)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let metric = Metric::with_value(&kind, &id, value.as_str())?;
    tracing::debug!(trace_id = %trace_id, metric = %metric, "Path update");
    state.repo.upsert(metric).await?;
    Ok(StatusCode::OK)
}

/// `POST /update/{type}/{id}` without a value segment.
async fn update_without_value(
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let metric = Metric::new(&kind, &id)?;
    Err(MetricError::InvalidValue(format!("no value given for {metric}")).into())
}

/// `POST /update`; answers with the stored metric.
async fn update_json(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Metric>> {
    require_json(&headers)?;
    let metric = parse_metric(&body)?;
    let key = metric.key();
    state.repo.upsert(metric).await?;
    tracing::debug!(trace_id = %trace_id, key = %key, "JSON update");
    Ok(Json(state.repo.get(&key).await?))
}

/// `POST /updates`
async fn update_batch(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    require_json(&headers)?;
    let metrics = parse_metrics(&body)?;
    let count = metrics.len();
    state.repo.upsert_batch(metrics).await?;
    tracing::debug!(trace_id = %trace_id, count, "Batch update");
    Ok(StatusCode::OK)
}

/// `GET /value/{type}/{id}`: `%g` for gauges, `%d` for counters.
async fn value_plain(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<String> {
    let key = Metric::new(&kind, &id)?.key();
    let stored = state.repo.get(&key).await?;
    let value = stored
        .plain_value()
        .ok_or_else(|| MetricError::InvalidValue(format!("{key} has no value")))?;
    Ok(value)
}

/// `POST /value` with `{id, type}`.
async fn value_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Metric>> {
    require_json(&headers)?;
    let key = parse_metric(&body)?.key();
    Ok(Json(state.repo.get(&key).await?))
}

/// `GET /`: every stored metric in short form.
async fn index(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let metrics = state.repo.get_batch().await?;
    let mut page = String::from(
        "<!DOCTYPE html>\n<html>\n<head><title>Metrics</title></head>\n<body>\n<ul>\n",
    );
    for metric in &metrics {
        let _ = writeln!(page, "<li>{}</li>", escape_html(&metric.to_string()));
    }
    page.push_str("</ul>\n</body>\n</html>\n");
    Ok(Html(page))
}

/// `GET /ping`
async fn ping(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.repo.health().await {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "storage is unavailable")
    }
}

pub fn metric_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/ping", get(ping))
        .route("/update", post(update_json))
        .route("/updates", post(update_batch))
        .route("/update/{kind}/{id}", post(update_without_value))
        .route("/update/{kind}/{id}/{value}", post(update_from_path))
        .route("/value", post(value_json))
        .route("/value/{kind}/{id}", get(value_plain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrik_common::{MetricKey, MetricKind};

    #[test]
    fn storage_errors_map_to_statuses() {
        let missing = StorageError::NotFound(MetricKey {
            kind: MetricKind::Gauge,
            id: "X".into(),
        });
        assert_eq!(storage_status(&missing), StatusCode::NOT_FOUND);
        assert_eq!(
            storage_status(&MetricError::UnknownType("fridge".into()).into()),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            storage_status(&MetricError::SignFailed("X".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            storage_status(&StorageError::FailedConnection("refused".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let partial = StorageError::PartialBatch {
            applied: 1,
            total: 2,
            source: Box::new(MetricError::InvalidId.into()),
        };
        assert_eq!(storage_status(&partial), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn json_content_type_allows_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(require_json(&headers).is_ok());

        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert_eq!(
            require_json(&headers).unwrap_err().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert!(require_json(&HeaderMap::new()).is_err());
    }

    #[test]
    fn batch_parse_reports_first_bad_entry() {
        let body = br#"[{"id":"A","type":"gauge","value":1},{"id":"B","type":"fridge"}]"#;
        let err = parse_metrics(body).unwrap_err();
        assert_eq!(err, MetricError::UnknownType("fridge".into()));
        assert!(matches!(parse_metrics(b"{"), Err(MetricError::InvalidJson(_))));
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("gauge/<b>&'\"/1"), "gauge/&lt;b&gt;&amp;&#39;&quot;/1");
    }
}
