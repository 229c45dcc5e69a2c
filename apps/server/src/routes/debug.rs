use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use file_sessions::FileSessionInfo;

use crate::state::AppState;

/// Operator/debugging surface over the File Session Manager (spec §4.4).
/// Never consulted by the analysis pipeline itself.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/debug/file-sessions", get(list_sessions))
        .route("/debug/cleanup-session/{id}", post(force_cleanup))
        .route("/debug/periodic-cleanup", post(run_periodic_cleanup))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<FileSessionInfo>> {
    Json(state.file_sessions.get_active_sessions().await)
}

async fn force_cleanup(State(state): State<AppState>, Path(id): Path<String>) -> Json<bool> {
    Json(state.file_sessions.force_cleanup(&id).await)
}

async fn run_periodic_cleanup(State(state): State<AppState>) -> Json<usize> {
    Json(state.file_sessions.periodic_cleanup().await)
}
