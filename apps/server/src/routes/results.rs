use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use results_store::{QuestionResult, SubmissionAggregate, SubmissionKey};

use crate::error::{Result, ServerError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/results/submissions", get(list_submissions))
        .route(
            "/results/submission/{key}",
            get(get_transformed).delete(clear),
        )
        .route("/results/submission/{key}/raw", get(get_raw))
}

async fn get_transformed(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Vec<QuestionResult>>> {
    state
        .results_store
        .get_transformed(&key)
        .await
        .map(Json)
        .map_err(|_| ServerError::NotFound(key))
}

async fn get_raw(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SubmissionAggregate>> {
    state
        .results_store
        .get_raw(&key)
        .await
        .map(Json)
        .map_err(|_| ServerError::NotFound(key))
}

async fn list_submissions(State(state): State<AppState>) -> Json<Vec<SubmissionKey>> {
    Json(state.results_store.list_all().await)
}

async fn clear(State(state): State<AppState>, Path(key): Path<String>) {
    state.results_store.clear(&key).await;
}
