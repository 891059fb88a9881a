pub mod most_play_with;
pub mod queue;
pub mod targets;
pub mod update;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::analyze::{Analyzer, AnalyzerSettings, MemoryMatchStore};
    use crate::api::state::AppState;
    use crate::cache::{MemoryCache, PlayerRecord, TargetRepository, TrackerStatus};
    use crate::models::{ModeStatus, ParsedState};
    use crate::schedule::{AdmissionController, Intervals, TaskQueue};

    /// State over in-memory stores with one active player, uno `42`.
    pub async fn setup_test_state() -> AppState {
        let cache = Arc::new(MemoryCache::new());
        let repo = TargetRepository::new(cache.clone());
        repo.set_tracker_status(TrackerStatus::Active).await.unwrap();

        let mut player = PlayerRecord::new("42");
        player.username = vec!["Ghost".into()];
        player.games.all.status = ParsedState::Matches;
        player.games.mw_mp.status = ModeStatus::Enabled;
        repo.save_player(&player).await.unwrap();

        let admission =
            AdmissionController::new(repo, TaskQueue::new(cache), Intervals::default(), 100);
        let analyzer = Analyzer::new(Arc::new(MemoryMatchStore::new()), AnalyzerSettings::default());
        AppState::new(admission, analyzer)
    }

    async fn into_json(resp: axum::response::Response) -> (StatusCode, Value) {
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        into_json(resp).await
    }

    pub async fn send_json(
        app: axum::Router,
        method: &str,
        uri: &str,
        body: &str,
    ) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        into_json(resp).await
    }
}
