use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::cache::{recent_activity, ActivityEntry};
use crate::models::Task;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.admission.queue().all().await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.admission.queue().remove(&name, Utc::now()).await?))
}

/// Worker callback: claim the head task.
pub async fn start(State(state): State<AppState>) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.admission.queue().mark_running(Utc::now()).await?))
}

#[derive(Debug, Deserialize)]
pub struct FinishRequest {
    pub ok: bool,
    #[serde(default)]
    pub records: u64,
}

/// Worker callback for the running head task.
pub async fn finish(
    State(state): State<AppState>,
    Json(req): Json<FinishRequest>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(
        state
            .admission
            .finish_task(req.ok, req.records, Utc::now())
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_activity_count")]
    pub count: usize,
}

fn default_activity_count() -> usize {
    20
}

/// Recent admissions, newest first.
pub async fn activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, ApiError> {
    let entries = recent_activity(state.repo().cache().as_ref(), query.count).await?;
    Ok(Json(entries))
}

/// Administrative reset. Returns the dropped tasks.
pub async fn clear(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.admission.queue().clear(Utc::now()).await?))
}
