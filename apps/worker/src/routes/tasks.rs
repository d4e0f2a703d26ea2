//! Task control HTTP route handlers
//!
//! - `GET /tasks` - Every registered task
//! - `GET /tasks/running` - The task currently executing, if any
//! - `PUT /tasks/:slug?name=value` - Queue a run with the given arguments

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use crate::error::WorkerResult;
use crate::tasks::{Arguments, ParameterValue, Progress, RunningTask, TaskManager, TaskMetadata};

/// Create the task control router
pub fn tasks_router(manager: TaskManager) -> Router {
    Router::new()
        .route("/", get(list_tasks))
        .route("/running", get(running_tasks))
        .route("/:slug", put(start_task))
        .with_state(manager)
}

async fn list_tasks(State(manager): State<TaskManager>) -> Json<Vec<TaskMetadata>> {
    Json(manager.all_tasks())
}

async fn running_tasks(State(manager): State<TaskManager>) -> Json<Vec<RunningTask>> {
    Json(manager.running_tasks())
}

/// Query values arrive as text and are coerced to each parameter's kind
/// when bound.
///
/// # Response
/// - 202 Accepted once the run is queued
/// - 404 Not Found for an unknown slug
/// - 400 Bad Request for unknown or missing arguments
async fn start_task(
    State(manager): State<TaskManager>,
    Path(slug): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> WorkerResult<impl IntoResponse> {
    let arguments: Arguments = query
        .into_iter()
        .map(|(name, value)| (name, ParameterValue::Text(value)))
        .collect();

    manager.start_task(&slug, Progress::noop(), arguments, None)?;
    tracing::info!(task = %slug, "Task queued over HTTP");

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "queued",
            "slug": slug,
        })),
    ))
}
