use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use orchestration::QuestionReadyPayload;
use results_store::QuestionResult;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{Result, ServerError};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AckResponse {
    status: &'static str,
}

fn ack() -> Json<AckResponse> {
    Json(AckResponse { status: "ok" })
}

/// Shared decode step for every webhook route (spec §4.8a/b): accept
/// either invocation shape, then require the event-specific fields
/// before parsing into a typed payload.
fn decode_and_parse<T: DeserializeOwned>(body: &Bytes, required_fields: &[&str]) -> Result<T> {
    let decoded = envelope::decode_body(body)?;
    envelope::require_fields(&decoded.payload, required_fields)?;
    serde_json::from_value(decoded.payload)
        .map_err(|e| ServerError::Envelope(envelope::EnvelopeError::MalformedEnvelope(e.to_string())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/student-submission", post(student_submission))
        .route("/webhooks/audio-conversion-done", post(audio_conversion_done))
        .route("/webhooks/transcription-done", post(transcription_done))
        .route(
            "/webhooks/question-analysis-ready",
            post(question_analysis_ready),
        )
        .route("/webhooks/pronunciation-done", post(stage_done))
        .route("/webhooks/grammar-done", post(stage_done))
        .route("/webhooks/lexical-done", post(stage_done))
        .route("/webhooks/vocabulary-done", post(stage_done))
        .route("/webhooks/fluency-done", post(stage_done))
        .route("/webhooks/analysis-complete", post(analysis_complete))
        .route(
            "/webhooks/submission-analysis-complete",
            post(submission_analysis_complete),
        )
}

#[derive(Deserialize)]
struct StudentSubmissionEvent {
    submission_url: String,
    question_number: u32,
    audio_url: String,
}

/// Consumes one `STUDENT_SUBMISSION` event (one per audio URL, already
/// split by `/submit`) and kicks off audio conversion and transcription
/// in parallel by calling the two external collaborators directly,
/// rather than re-publishing two more broker topics (spec §4.8: "two
/// publishes, or two direct calls").
async fn student_submission(State(state): State<AppState>, body: Bytes) -> Result<Json<AckResponse>> {
    let event: StudentSubmissionEvent =
        decode_and_parse(&body, &["submission_url", "question_number", "audio_url"])?;

    tokio::join!(
        state
            .audio_transcoder
            .submit(&event.submission_url, event.question_number, &event.audio_url),
        state
            .speech_to_text
            .submit(&event.submission_url, event.question_number, &event.audio_url),
    );

    Ok(ack())
}

#[derive(Deserialize)]
struct AudioConversionDoneEvent {
    submission_url: String,
    question_number: u32,
    total_questions: u32,
    wav_path: String,
    session_id: String,
    audio_duration: f64,
    #[serde(default)]
    error: Option<String>,
}

async fn audio_conversion_done(State(state): State<AppState>, body: Bytes) -> Result<Json<AckResponse>> {
    let event: AudioConversionDoneEvent = decode_and_parse(
        &body,
        &[
            "submission_url",
            "question_number",
            "total_questions",
            "wav_path",
            "session_id",
            "audio_duration",
        ],
    )?;

    if event.error.is_none() {
        let registered = state
            .file_sessions
            .register(
                event.session_id.clone(),
                event.wav_path.clone(),
                std::collections::HashSet::from(["pronunciation".to_string()]),
                None,
            )
            .await;
        if let Err(err) = registered {
            tracing::warn!(session_id = %event.session_id, error = %err, "file_session_register_failed");
        }
    }

    state
        .coordinator
        .on_audio_ready(
            &event.submission_url,
            event.question_number,
            event.total_questions,
            event.session_id,
            event.wav_path,
            event.audio_duration,
            event.error,
        )
        .await;

    Ok(ack())
}

#[derive(Deserialize)]
struct TranscriptionDoneEvent {
    submission_url: String,
    question_number: u32,
    total_questions: u32,
    transcript: String,
    #[serde(default)]
    word_details: Value,
    #[serde(default)]
    error: Option<String>,
}

async fn transcription_done(State(state): State<AppState>, body: Bytes) -> Result<Json<AckResponse>> {
    let event: TranscriptionDoneEvent = decode_and_parse(
        &body,
        &["submission_url", "question_number", "total_questions", "transcript"],
    )?;

    state
        .coordinator
        .on_transcript_ready(
            &event.submission_url,
            event.question_number,
            event.total_questions,
            event.transcript,
            event.word_details,
            event.error,
        )
        .await;

    Ok(ack())
}

#[derive(Deserialize)]
struct QuestionAnalysisReadyEvent {
    submission_url: String,
    question_number: u32,
    total_questions: u32,
    session_id: String,
    wav_path: String,
    audio_duration: f64,
    transcript: String,
    #[serde(default)]
    word_details: Value,
    #[serde(default)]
    error: Option<String>,
}

async fn question_analysis_ready(State(state): State<AppState>, body: Bytes) -> Result<Json<AckResponse>> {
    let event: QuestionAnalysisReadyEvent = decode_and_parse(
        &body,
        &[
            "submission_url",
            "question_number",
            "total_questions",
            "session_id",
            "wav_path",
            "audio_duration",
            "transcript",
        ],
    )?;

    state.orchestrator.on_analysis_ready(QuestionReadyPayload {
        submission_key: event.submission_url,
        question_number: event.question_number,
        total_questions: event.total_questions,
        session_id: event.session_id,
        wav_path: event.wav_path,
        audio_duration: event.audio_duration,
        transcript: event.transcript,
        word_details: event.word_details,
        error: event.error,
    });

    Ok(ack())
}

#[derive(Deserialize)]
struct StageDoneEvent {
    submission_url: String,
    question_number: u32,
    #[serde(default)]
    result: Value,
}

/// Pure observability: the orchestrator already sequences pronunciation
/// before fluency in-process (spec §4.6), so these routes do not drive
/// any state transition — they only make each stage's completion
/// visible in logs, matching spec §6's "observability and fluency
/// gating" note.
async fn stage_done(State(_state): State<AppState>, body: Bytes) -> Result<Json<AckResponse>> {
    let event: StageDoneEvent = decode_and_parse(&body, &["submission_url", "question_number"])?;
    tracing::info!(
        submission_url = %event.submission_url,
        question_number = event.question_number,
        result = %event.result,
        "analysis_stage_done"
    );
    Ok(ack())
}

#[derive(Deserialize)]
struct AnalysisCompleteEvent {
    submission_url: String,
    question_number: u32,
    total_questions: u32,
    result: QuestionResult,
}

async fn analysis_complete(State(state): State<AppState>, body: Bytes) -> Result<Json<AckResponse>> {
    let event: AnalysisCompleteEvent = decode_and_parse(
        &body,
        &["submission_url", "question_number", "total_questions", "result"],
    )?;

    state
        .aggregator
        .on_analysis_complete(
            &event.submission_url,
            event.question_number,
            event.total_questions,
            event.result,
        )
        .await;

    Ok(ack())
}

#[derive(Deserialize)]
struct SubmissionAnalysisCompleteEvent {
    submission_url: String,
    total_questions: u32,
}

/// Terminal event; no-ops beyond logging (spec §6).
async fn submission_analysis_complete(State(_state): State<AppState>, body: Bytes) -> Result<Json<AckResponse>> {
    let event: SubmissionAnalysisCompleteEvent =
        decode_and_parse(&body, &["submission_url", "total_questions"])?;
    tracing::info!(
        submission_url = %event.submission_url,
        total_questions = event.total_questions,
        "submission_analysis_complete"
    );
    Ok(ack())
}
