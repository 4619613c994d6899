//! HTTP request handlers.

use super::AppState;
use crate::backend::{
    list_queues, BackendError, GetQueuesResponse, JobStatus, ListQueuesQuery, QueueAdapter,
};
use crate::stats::{get_stats, GetMetricsResponse, StatsQuery};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let queue_count = state.registry.len().await;
    let page = DASHBOARD_TEMPLATE
        .replace("{{title}}", "queuewatch")
        .replace("{{queue_count}}", &queue_count.to_string());

    Html(page)
}

// ============================================================================
// API: Queues and stats
// ============================================================================

pub async fn handle_get_queues(
    State(state): State<AppState>,
    Query(query): Query<ListQueuesQuery>,
) -> impl IntoResponse {
    let pairs = state.registry.pairs().await;

    match list_queues(&pairs, &query).await {
        Ok(queues) => Json(GetQueuesResponse { queues }).into_response(),
        Err(e) => {
            tracing::error!("Failed to list queues: {}", e);
            backend_error_response(e)
        }
    }
}

pub async fn handle_get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> impl IntoResponse {
    let pairs = state.registry.pairs().await;

    match get_stats(&pairs, query.timeframe, query.start, query.end).await {
        Ok(queues) => Json(GetMetricsResponse { queues }).into_response(),
        Err(e) => {
            tracing::error!("Failed to collect queue stats: {}", e);
            backend_error_response(e)
        }
    }
}

// ============================================================================
// API: Queue actions
// ============================================================================

pub async fn handle_retry_all(
    State(state): State<AppState>,
    Path((queue, status)): Path<(String, String)>,
) -> Response {
    let status = match status.parse::<JobStatus>() {
        Ok(s) if s.is_retryable() => s,
        Ok(s) => {
            return (StatusCode::BAD_REQUEST, format!("Cannot retry {} jobs", s)).into_response()
        }
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    run_action(&state, &queue, "retry", move |q| async move { q.retry_all(status).await }).await
}

pub async fn handle_promote_all(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Response {
    run_action(&state, &queue, "promote", |q| async move { q.promote_all().await }).await
}

pub async fn handle_clean_all(
    State(state): State<AppState>,
    Path((queue, status)): Path<(String, String)>,
) -> Response {
    let status = match status.parse::<JobStatus>() {
        Ok(s) if s.is_cleanable() => s,
        Ok(s) => {
            return (StatusCode::BAD_REQUEST, format!("Cannot clean {} jobs", s)).into_response()
        }
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    run_action(&state, &queue, "clean", move |q| async move { q.clean_all(status).await }).await
}

pub async fn handle_pause_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Response {
    run_action(&state, &queue, "pause", |q| async move { q.pause().await }).await
}

pub async fn handle_resume_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Response {
    run_action(&state, &queue, "resume", |q| async move { q.resume().await }).await
}

pub async fn handle_empty_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> Response {
    run_action(&state, &queue, "empty", |q| async move { q.empty().await }).await
}

#[derive(Debug, Deserialize)]
pub struct AddJobRequest {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub options: serde_json::Value,
}

pub async fn handle_add_job(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Json(req): Json<AddJobRequest>,
) -> Response {
    let adapter = match state.registry.get(&queue).await {
        Ok(q) => q,
        Err(e) => return backend_error_response(e),
    };

    match adapter.add_job(&req.name, req.data, req.options).await {
        Ok(job) => {
            tracing::info!("Added job {} ({}) to {}", job.id, job.name, queue);
            Json(job).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to add job to {}: {}", queue, e);
            backend_error_response(e)
        }
    }
}

async fn run_action<F, Fut>(state: &AppState, queue: &str, action: &str, f: F) -> Response
where
    F: FnOnce(Arc<dyn QueueAdapter>) -> Fut,
    Fut: Future<Output = Result<(), BackendError>>,
{
    let adapter = match state.registry.get(queue).await {
        Ok(q) => q,
        Err(e) => return backend_error_response(e),
    };

    match f(adapter).await {
        Ok(()) => {
            tracing::info!("Queue action {} on {}", action, queue);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::error!("Queue action {} on {} failed: {}", action, queue, e);
            backend_error_response(e)
        }
    }
}

fn backend_error_response(e: BackendError) -> Response {
    let status = match &e {
        BackendError::QueueNotFound(_) => StatusCode::NOT_FOUND,
        BackendError::InvalidStatus { .. } | BackendError::InvalidJob(_) => StatusCode::BAD_REQUEST,
        BackendError::Unavailable(_) => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string()).into_response()
}

// ============================================================================
// Static Assets
// ============================================================================

pub async fn handle_favicon() -> impl IntoResponse {
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
        <rect x="5" y="5" width="90" height="90" rx="18" fill="#2f6f5e"/>
        <rect x="22" y="55" width="12" height="28" fill="white"/>
        <rect x="44" y="38" width="12" height="45" fill="white"/>
        <rect x="66" y="20" width="12" height="63" fill="white"/>
    </svg>"##;

    (
        [(axum::http::header::CONTENT_TYPE, "image/svg+xml")],
        svg
    )
}
