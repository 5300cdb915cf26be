//! Scheduler progress as seen through the status API

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{LOG_PATH, config_for, log_body, runner_for, serve};
use dataset_dl::{NoopSink, Scheduler};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::MockServer;

#[tokio::test]
async fn status_shows_watermark_and_last_success() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    serve(&server, LOG_PATH, log_body(&[(7, "2019/01/rv-7.pfx2as.gz")])).await;
    serve(&server, "/rv/2019/01/rv-7.pfx2as.gz", "seven").await;
    serve(&server, "/geoip/databases/GeoLite2-City/download", "city").await;

    let config = config_for(&server, temp_dir.path());
    let schedule = config.schedule.clone();
    let mut scheduler = Scheduler::new(runner_for(config, Arc::new(NoopSink)), schedule);
    let app = dataset_dl::api::create_router(scheduler.status());

    let report = scheduler.run_once(&CancellationToken::new()).await;
    assert!(report.is_success(), "{report:?}");

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["cycles_run"], 1);
    assert_eq!(body["watermarks"]["routeviews-ipv4"], 7);
    assert!(body["last_success"].is_string());
    assert_eq!(body["last_cycle"]["sources"][1]["source"], "maxmind");
}
