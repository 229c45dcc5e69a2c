use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use eventbus::Topic;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitRequest {
    audio_urls: Vec<String>,
    submission_url: String,
    total_questions: u32,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    submission_url: String,
    published: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/submit", post(submit))
}

/// Splits one submission into one `STUDENT_SUBMISSION` publish per audio
/// URL (spec §6). Each published event carries a single `audio_url` and
/// the question number derived from its position, since downstream
/// (audio conversion, transcription) work is scoped per question.
async fn submit(State(state): State<AppState>, Json(request): Json<SubmitRequest>) -> Json<SubmitResponse> {
    for (index, audio_url) in request.audio_urls.iter().enumerate() {
        let question_number = (index + 1) as u32;
        let payload = serde_json::json!({
            "submission_url": request.submission_url,
            "question_number": question_number,
            "audio_url": audio_url,
            "total_questions": request.total_questions,
        });
        state.publisher.publish(Topic::StudentSubmission, &payload).await;
    }

    Json(SubmitResponse {
        submission_url: request.submission_url,
        published: request.audio_urls.len(),
    })
}
