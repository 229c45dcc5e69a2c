use chrono::{DateTime, Utc};
use results_store::SubResult;
use serde_json::Value;

/// The decoded `QUESTION_ANALYSIS_READY` event (spec §6): the union of
/// the Analysis Coordinator's two inputs, plus whichever side reported
/// an error, coalesced into one optional field.
#[derive(Debug, Clone)]
pub struct QuestionReadyPayload {
    pub submission_key: String,
    pub question_number: u32,
    pub total_questions: u32,
    pub session_id: String,
    pub wav_path: String,
    pub audio_duration: f64,
    pub transcript: String,
    pub word_details: Value,
    pub error: Option<String>,
}

/// Per-QuestionKey state owned by the Analysis Orchestrator (spec §3).
/// The four analysis flags and the fluency flag are represented as
/// `Option<SubResult>`: `None` means "not done yet", `Some` means done
/// (successfully or with an error sub-result) — there is no separate
/// boolean, since the result itself carries that information.
pub(crate) struct AnalysisState {
    pub wav_path: String,
    pub transcript: String,
    pub session_id: String,
    pub total_questions: u32,
    pub audio_duration: f64,
    pub pronunciation: Option<SubResult>,
    pub pronunciation_word_detail: Option<Value>,
    pub grammar: Option<SubResult>,
    pub lexical: Option<SubResult>,
    pub vocabulary: Option<SubResult>,
    pub fluency: Option<SubResult>,
    pub emitted_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl AnalysisState {
    pub fn new(payload: &QuestionReadyPayload) -> Self {
        Self {
            wav_path: payload.wav_path.clone(),
            transcript: payload.transcript.clone(),
            session_id: payload.session_id.clone(),
            total_questions: payload.total_questions,
            audio_duration: payload.audio_duration,
            pronunciation: None,
            pronunciation_word_detail: None,
            grammar: None,
            lexical: None,
            vocabulary: None,
            fluency: None,
            emitted_complete: false,
            created_at: Utc::now(),
        }
    }

    /// All five stages (pronunciation, grammar, lexical, vocabulary,
    /// fluency) have recorded a result, whether success or error.
    pub fn is_done(&self) -> bool {
        self.pronunciation.is_some()
            && self.grammar.is_some()
            && self.lexical.is_some()
            && self.vocabulary.is_some()
            && self.fluency.is_some()
    }
}
