use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::analyze::{Analyzer, RunSummary};
use crate::api::state::AppState;
use crate::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Progress of the background analyzer run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyzerState {
    pub status: AnalyzerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

/// Start an analyzer run in the background. Only one run at a time.
pub async fn start(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    {
        let mut current = state.analyzer_state.write().await;
        if current.status == AnalyzerStatus::Running {
            return Err(ApiError::Conflict(
                "Most play with already running".to_string(),
            ));
        }
        *current = AnalyzerState {
            status: AnalyzerStatus::Running,
            started_at: Some(Utc::now()),
            ..Default::default()
        };
    }

    let analyzer = state.analyzer.clone();
    let analyzer_state = state.analyzer_state.clone();
    tokio::spawn(async move {
        run_analyzer(analyzer, analyzer_state).await;
    });

    let current = state.analyzer_state.read().await;
    Ok((StatusCode::ACCEPTED, Json(current.clone())))
}

pub async fn status(State(state): State<AppState>) -> Json<AnalyzerState> {
    let current = state.analyzer_state.read().await;
    Json(current.clone())
}

async fn run_analyzer(analyzer: Arc<Analyzer>, analyzer_state: Arc<RwLock<AnalyzerState>>) {
    let result = analyzer.run().await;
    let mut state = analyzer_state.write().await;
    state.completed_at = Some(Utc::now());
    match result {
        Ok(summary) => {
            state.status = AnalyzerStatus::Completed;
            state.summary = Some(summary);
        }
        Err(e) => {
            tracing::error!(error = %e, "Most play with failed");
            state.status = AnalyzerStatus::Failed;
            state.error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::build_router;
    use crate::api::routes::test_support::{get_json, send_json, setup_test_state};

    #[tokio::test]
    async fn test_start_returns_202() {
        let state = setup_test_state().await;
        let (status, json) =
            send_json(build_router(state), "POST", "/api/most-play-with", "").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "running");
    }

    #[tokio::test]
    async fn test_start_rejects_concurrent() {
        let state = setup_test_state().await;
        {
            let mut current = state.analyzer_state.write().await;
            current.status = AnalyzerStatus::Running;
        }
        let (status, _) = send_json(build_router(state), "POST", "/api/most-play-with", "").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_run_updates_status() {
        let state = setup_test_state().await;
        run_analyzer(state.analyzer.clone(), state.analyzer_state.clone()).await;

        let (status, json) = get_json(build_router(state), "/api/most-play-with/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "completed");
        assert_eq!(json["summary"]["targets"], 0);
    }
}
