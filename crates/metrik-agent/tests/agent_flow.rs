mod common;

use axum::http::StatusCode;
use common::spawn_recorder;
use metrik_agent::{Agent, ReportShape};
use metrik_collector::poll::PollCounter;
use metrik_collector::random::RandomCollector;
use metrik_common::{MetricKey, MetricKind};
use metrik_storage::{MemStore, Repository};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn poll_count_is_reset_after_each_report() {
    let server = spawn_recorder(StatusCode::OK).await;
    let repo: Arc<dyn Repository> = Arc::new(MemStore::new());
    let agent = Agent::builder()
        .repository(Arc::clone(&repo))
        .address(server.address())
        .report_shape(ReportShape::Url)
        .poll_interval(Duration::from_millis(20))
        .report_interval(Duration::from_millis(60))
        .collectors(vec![
            Box::new(RandomCollector::new()),
            Box::new(PollCounter::new()),
        ])
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(agent.run(cancel.clone()));
    // Report ticks land at 60, 120 and 180ms.
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("agent should stop after cancel")
        .unwrap();

    let poll_counts: Vec<String> = server
        .paths()
        .into_iter()
        .filter_map(|p| p.strip_prefix("/update/counter/PollCount/").map(str::to_string))
        .collect();
    assert!(poll_counts.len() >= 3, "only {} reports", poll_counts.len());
    assert!(poll_counts.iter().all(|v| v == "1"), "{poll_counts:?}");

    let random_reports = server
        .paths()
        .iter()
        .filter(|p| p.starts_with("/update/gauge/RandomValue/"))
        .count();
    assert!(random_reports >= poll_counts.len());
}

#[tokio::test]
async fn failed_reports_keep_poll_count() {
    let server = spawn_recorder(StatusCode::INTERNAL_SERVER_ERROR).await;
    let repo: Arc<dyn Repository> = Arc::new(MemStore::new());
    let agent = Agent::builder()
        .repository(Arc::clone(&repo))
        .address(server.address())
        .report_shape(ReportShape::BatchJson)
        .poll_interval(Duration::from_millis(10))
        .report_interval(Duration::from_millis(30))
        .collectors(vec![Box::new(PollCounter::new())])
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(agent.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(120)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert!(!server.requests().is_empty());
    let key = MetricKey {
        kind: MetricKind::Counter,
        id: "PollCount".to_string(),
    };
    assert_eq!(repo.get(&key).await.unwrap().delta(), Some(1));
}
