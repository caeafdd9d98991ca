mod common;

use axum::http::StatusCode;
use common::spawn_recorder;
use metrik_agent::{ReportError, ReportShape, Reporter};
use metrik_common::crypto::PayloadDecryptor;
use metrik_common::Metric;
use metrik_storage::{MemStore, Repository};
use rsa::RsaPrivateKey;
use std::sync::Arc;
use std::time::Duration;

async fn seeded_repo() -> Arc<dyn Repository> {
    let repo: Arc<dyn Repository> = Arc::new(MemStore::new());
    repo.upsert_batch(vec![
        Metric::gauge("Alloc", 2048.0),
        Metric::counter("PollCount", 1),
        Metric::gauge("RandomValue", 0.5),
    ])
    .await
    .unwrap();
    repo
}

#[tokio::test]
async fn url_shape_posts_each_metric_to_its_path() {
    let server = spawn_recorder(StatusCode::OK).await;
    let reporter = Reporter::new(
        seeded_repo().await,
        &server.address(),
        ReportShape::Url,
        Duration::from_secs(2),
    )
    .unwrap();

    assert_eq!(reporter.report().await.unwrap(), 3);
    assert_eq!(
        server.paths(),
        [
            "/update/gauge/Alloc/2048.000000",
            "/update/gauge/RandomValue/0.500000",
            "/update/counter/PollCount/1",
        ]
    );
    let requests = server.requests();
    assert!(requests
        .iter()
        .all(|r| r.content_type.as_deref() == Some("text/plain")));
}

#[tokio::test]
async fn batch_shape_sends_one_array() {
    let server = spawn_recorder(StatusCode::OK).await;
    let reporter = Reporter::new(
        seeded_repo().await,
        &server.address(),
        ReportShape::BatchJson,
        Duration::from_secs(2),
    )
    .unwrap()
    .with_sign_key("s3cret");

    reporter.report().await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/updates");
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    let sent: Vec<Metric> = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|m| m.verify("s3cret").is_ok()));
}

#[tokio::test]
async fn reporting_leaves_repository_untouched() {
    let server = spawn_recorder(StatusCode::OK).await;
    let repo = seeded_repo().await;
    let before = repo.get_batch().await.unwrap();
    let reporter = Reporter::new(
        Arc::clone(&repo),
        &server.address(),
        ReportShape::Json,
        Duration::from_secs(2),
    )
    .unwrap();

    reporter.report().await.unwrap();
    assert_eq!(server.requests().len(), 3);
    assert_eq!(repo.get_batch().await.unwrap(), before);
}

#[tokio::test]
async fn non_ok_status_is_report_failed() {
    let server = spawn_recorder(StatusCode::BAD_REQUEST).await;
    let reporter = Reporter::new(
        seeded_repo().await,
        &server.address(),
        ReportShape::Json,
        Duration::from_secs(2),
    )
    .unwrap();

    match reporter.report().await {
        Err(ReportError::ReportFailed { url, status }) => {
            assert_eq!(status, 400);
            assert!(url.ends_with("/update"));
        }
        other => panic!("expected ReportFailed, got {other:?}"),
    }
    // The report stops at the first rejected request.
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let reporter = Reporter::new(
        seeded_repo().await,
        &addr.to_string(),
        ReportShape::BatchJson,
        Duration::from_secs(2),
    )
    .unwrap();
    assert!(matches!(
        reporter.report().await,
        Err(ReportError::Transport { .. })
    ));
}

#[tokio::test]
async fn encrypted_json_decrypts_to_metric() {
    let server = spawn_recorder(StatusCode::OK).await;
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let decryptor = PayloadDecryptor::new(private);

    let repo: Arc<dyn Repository> = Arc::new(MemStore::new());
    repo.upsert(Metric::gauge("Temp", 21.5)).await.unwrap();
    let reporter = Reporter::new(repo, &server.address(), ReportShape::Json, Duration::from_secs(2))
        .unwrap()
        .with_encryptor(Some(decryptor.encryptor()));

    reporter.report().await.unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].encryption.as_deref(), Some("rsa"));
    let plain = decryptor.decrypt(&requests[0].body).unwrap();
    let metric: Metric = serde_json::from_slice(&plain).unwrap();
    assert_eq!(metric, Metric::gauge("Temp", 21.5));
}
