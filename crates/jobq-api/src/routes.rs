//! Dashboard routes

use axum::{
    extract::{Path, Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use jobq_queue::{Job, JobState, QueueMetrics, StateCounts};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Default page size for `/api/jobs`
pub const DEFAULT_JOB_LIMIT: usize = 50;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: u64,
    #[serde(flatten)]
    pub states: StateCounts,
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let states = state.manager().stats().await?;
    Ok(Json(StatsResponse {
        total: states.values().sum(),
        states,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub state: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let filter = match query.state.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(s) => Some(
            s.parse::<JobState>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
    };
    let limit = query.limit.unwrap_or(DEFAULT_JOB_LIMIT);

    let mut jobs = state.manager().list(filter).await?;
    jobs.truncate(limit);
    Ok(Json(jobs))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.manager().get(&id).await?))
}

pub async fn dlq(State(state): State<AppState>) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(state.manager().list_dlq().await?))
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<Json<QueueMetrics>> {
    Ok(Json(state.manager().metrics().await?))
}

/// Build the dashboard router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/dlq", get(dlq))
        .route("/api/metrics", get(metrics))
        .with_state(state)
}
