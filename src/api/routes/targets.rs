use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{GamesStatus, TargetKind};

#[derive(Debug, Deserialize)]
pub struct TargetsQuery {
    #[serde(default = "default_kind")]
    pub kind: TargetKind,
}

fn default_kind() -> TargetKind {
    TargetKind::Player
}

/// Ids of every cached target of one kind.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<TargetsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let mut ids = state.repo().target_ids(query.kind).await?;
    ids.sort();
    Ok(Json(ids))
}

pub async fn games(
    State(state): State<AppState>,
    Path(uno): Path<String>,
) -> Result<Json<GamesStatus>, ApiError> {
    state
        .repo()
        .games(&uno)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("[{}] not found", uno)))
}

#[derive(Debug, Serialize)]
pub struct UsernameResponse {
    pub uno: String,
}

/// Resolve a username alias to its player uno.
pub async fn by_username(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<UsernameResponse>, ApiError> {
    state
        .repo()
        .uno_by_username(&name)
        .await?
        .map(|uno| Json(UsernameResponse { uno }))
        .ok_or_else(|| ApiError::NotFound(format!("[{}] not found", name)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::build_router;
    use crate::api::routes::test_support::{get_json, setup_test_state};
    use crate::cache::GroupRecord;

    #[tokio::test]
    async fn test_target_games() {
        let state = setup_test_state().await;

        let (status, json) = get_json(build_router(state.clone()), "/api/targets/42/games").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["mw_mp"]["status"], "enabled");
        assert_eq!(json["all"]["status"], "matches");

        let (status, json) = get_json(build_router(state), "/api/targets/9/games").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["message"], "[9] not found");
    }

    #[tokio::test]
    async fn test_list_targets_by_kind() {
        let state = setup_test_state().await;
        state
            .repo()
            .save_group(&GroupRecord::new("squad"))
            .await
            .unwrap();

        let (status, json) = get_json(build_router(state.clone()), "/api/targets").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!(["42"]));

        let (_, json) = get_json(build_router(state), "/api/targets?kind=group").await;
        assert_eq!(json, json!(["squad"]));
    }

    #[tokio::test]
    async fn test_username_lookup() {
        let state = setup_test_state().await;

        let (status, json) = get_json(build_router(state.clone()), "/api/usernames/Ghost").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["uno"], "42");

        let (status, _) = get_json(build_router(state), "/api/usernames/Nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
