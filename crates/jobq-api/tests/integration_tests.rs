use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use jobq_api::{routes::api_router, AppState};
use jobq_persist::{SqliteBackend, SqliteConfig, SqliteJobStore};
use jobq_queue::{NewJob, QueueManager, QueueSettings};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

async fn setup() -> (Router, Arc<QueueManager>) {
    let db = SqliteBackend::new_with_config(SqliteConfig::memory())
        .await
        .unwrap();
    let manager = Arc::new(QueueManager::new(
        Arc::new(SqliteJobStore::new(db.pool().clone())),
        QueueSettings::default(),
    ));
    (api_router(AppState::new(manager.clone())), manager)
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (router, _manager) = setup().await;
    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_index_page_served() {
    let (router, _manager) = setup().await;
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = router.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("/api/stats"));
}

#[tokio::test]
async fn test_stats_and_jobs() {
    let (router, manager) = setup().await;

    let low = manager
        .enqueue(NewJob::new("echo low").with_priority(1))
        .await
        .unwrap();
    let high = manager
        .enqueue(NewJob::new("echo high").with_priority(9))
        .await
        .unwrap();
    let claimed = manager.claim(manager.now()).await.unwrap().unwrap();
    assert_eq!(claimed.id, high);

    let (status, stats) = get_json(&router, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["processing"], 1);
    assert_eq!(stats["dead"], 0);

    let (_, jobs) = get_json(&router, "/api/jobs").await;
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["id"], high.as_str());

    let (_, pending) = get_json(&router, "/api/jobs?state=pending").await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["id"], low.as_str());

    let (_, limited) = get_json(&router, "/api/jobs?limit=1").await;
    assert_eq!(limited.as_array().unwrap().len(), 1);

    let (status, job) = get_json(&router, &format!("/api/jobs/{}", low)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["command"], "echo low");
    assert_eq!(job["state"], "pending");
}

#[tokio::test]
async fn test_bad_state_filter_rejected() {
    let (router, _manager) = setup().await;
    let (status, body) = get_json(&router, "/api/jobs?state=sleeping").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let (router, _manager) = setup().await;
    let (status, body) = get_json(&router, "/api/jobs/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_dlq_and_metrics() {
    let (router, manager) = setup().await;

    let id = manager
        .enqueue(NewJob::new("exit 3").with_max_retries(0))
        .await
        .unwrap();
    manager.claim(manager.now()).await.unwrap();
    manager.fail(&id, "exit code 3", manager.now()).await.unwrap();

    let (status, dlq) = get_json(&router, "/api/dlq").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dlq[0]["id"], id.as_str());
    assert_eq!(dlq[0]["error_message"], "exit code 3");

    let (status, metrics) = get_json(&router, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["total"], 1);
    assert_eq!(metrics["completed"], 0);
    assert_eq!(metrics["jobs_last_24h"], 1);
}
