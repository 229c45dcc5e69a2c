use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct AudioReadyPayload {
    pub session_id: String,
    pub wav_path: String,
    pub audio_duration: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranscriptReadyPayload {
    pub transcript_text: String,
    pub word_details: serde_json::Value,
    pub error: Option<String>,
}

/// Per-QuestionKey fan-in state held by the Analysis Coordinator
/// (spec §3). `emitted` transitions false -> true at most once; both
/// readiness flags are monotonic — once a side has arrived it is never
/// forgotten, so the first arrival of each side wins and later duplicates
/// are no-ops.
#[derive(Debug, Clone)]
pub(crate) struct CoordinationState {
    pub created_at: DateTime<Utc>,
    pub total_questions: u32,
    pub audio: Option<AudioReadyPayload>,
    pub transcript: Option<TranscriptReadyPayload>,
    pub emitted: bool,
}

impl CoordinationState {
    pub fn new(total_questions: u32) -> Self {
        Self {
            created_at: Utc::now(),
            total_questions,
            audio: None,
            transcript: None,
            emitted: false,
        }
    }

    pub fn audio_ready(&self) -> bool {
        self.audio.is_some()
    }

    pub fn transcript_ready(&self) -> bool {
        self.transcript.is_some()
    }

    pub fn ready_to_emit(&self) -> bool {
        !self.emitted && self.audio_ready() && self.transcript_ready()
    }
}
