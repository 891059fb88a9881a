//! REST API endpoints.
//!
//! Thin Axum layer over the admission controller, the task queue and the
//! co-occurrence analyzer.

pub mod routes;
pub mod state;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::CacheError;
use crate::schedule::{QueueError, UpdateError};
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// The request was understood but refused by a domain rule.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Rejected(_) => (StatusCode::METHOD_NOT_ALLOWED, "REJECTED"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else if err.is_internal() {
            ApiError::Internal(err.to_string())
        } else {
            ApiError::Rejected(err.to_string())
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) => ApiError::NotFound(err.to_string()),
            QueueError::TaskRunning(_) | QueueError::Task(_) => ApiError::Conflict(err.to_string()),
            QueueError::Empty => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/update", post(routes::update::request_update))
        .route("/api/queue", get(routes::queue::list))
        .route("/api/queue/clear", post(routes::queue::clear))
        .route("/api/queue/start", post(routes::queue::start))
        .route("/api/queue/finish", post(routes::queue::finish))
        .route("/api/activity", get(routes::queue::activity))
        .route("/api/queue/:name", delete(routes::queue::remove))
        .route("/api/targets", get(routes::targets::list))
        .route("/api/targets/:uno/games", get(routes::targets::games))
        .route("/api/usernames/:name", get(routes::targets::by_username))
        .route("/api/most-play-with", post(routes::most_play_with::start))
        .route(
            "/api/most-play-with/status",
            get(routes::most_play_with::status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataKind, GameMode};

    #[test]
    fn test_update_error_mapping() {
        let err: ApiError = UpdateError::NotFound("1".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = UpdateError::InQueues {
            label: "Ghost".into(),
            game_mode: GameMode::MwMp,
            data_kind: DataKind::Matches,
        }
        .into();
        assert!(matches!(err, ApiError::Rejected(ref m) if m == "Ghost mw_mp matches in queues"));

        let err: ApiError = UpdateError::Cache(CacheError::WrongType("k".into())).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn test_queue_error_mapping() {
        let err: ApiError = QueueError::TaskRunning("x".into()).into();
        assert!(matches!(err, ApiError::Conflict(_)));
        let err: ApiError = QueueError::NotFound("x".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_error_response_status() {
        let resp = ApiError::Rejected("no".into()).into_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let resp = ApiError::Conflict("busy".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
