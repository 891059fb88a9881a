use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{DataKind, GameMode};

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub uno: String,
    pub game_mode: GameMode,
    pub data_kind: DataKind,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub message: String,
}

pub async fn request_update(
    State(state): State<AppState>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let message = state
        .admission
        .request_update(&req.uno, req.game_mode, req.data_kind)
        .await?;
    Ok(Json(UpdateResponse { message }))
}
