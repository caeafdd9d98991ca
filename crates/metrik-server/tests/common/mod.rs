#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use metrik_server::app;
use metrik_server::config::ServerConfig;
use metrik_server::state::AppState;
use metrik_storage::{MemStore, Repository};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn test_config(temp_dir: &TempDir, sign_key: &str) -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1:0".to_string(),
        store_interval_secs: 0,
        restore: false,
        database_dsn: String::new(),
        store_file: temp_dir
            .path()
            .join("metrics.json")
            .to_string_lossy()
            .to_string(),
        sign_key: sign_key.to_string(),
        private_key_path: None,
    }
}

pub fn context_with(backing: Arc<dyn Repository>, sign_key: &str) -> TestContext {
    let temp_dir = tempfile::tempdir().expect("temp dir should be created");
    let state = AppState::new(backing, test_config(&temp_dir, sign_key));
    let app = app::build_http_app(state.clone());
    TestContext {
        temp_dir,
        state,
        app,
    }
}

pub fn build_test_context(sign_key: &str) -> TestContext {
    context_with(Arc::new(MemStore::new()), sign_key)
}

pub fn rebuild_app(state: AppState) -> axum::Router {
    app::build_http_app(state)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: String,
    pub content_type: Option<String>,
    pub trace_id: Option<String>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("body should be JSON")
    }
}

pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: impl Into<Body>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder.body(body.into()).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let header = |name: &str| {
        resp.headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
    };
    let content_type = header("content-type");
    let trace_id = header("x-trace-id");
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");

    TestResponse {
        status,
        body: String::from_utf8_lossy(&bytes).to_string(),
        content_type,
        trace_id,
    }
}

pub async fn post_path(app: &axum::Router, uri: &str) -> TestResponse {
    send(app, "POST", uri, &[("content-type", "text/plain")], Body::empty()).await
}

pub async fn get(app: &axum::Router, uri: &str) -> TestResponse {
    send(app, "GET", uri, &[], Body::empty()).await
}

pub async fn post_json(app: &axum::Router, uri: &str, body: serde_json::Value) -> TestResponse {
    send(
        app,
        "POST",
        uri,
        &[("content-type", "application/json")],
        body.to_string(),
    )
    .await
}
