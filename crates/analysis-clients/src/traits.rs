use std::pin::Pin;

use results_store::SubResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Fires off an audio-conversion job for one question. Fire-and-forget:
/// the result arrives later via the `AUDIO_CONVERSION_DONE` webhook, not as
/// this call's return value (spec §2 data flow).
pub trait AudioTranscoder: Send + Sync {
    fn submit<'a>(
        &'a self,
        submission_key: &'a str,
        question_number: u32,
        audio_url: &'a str,
    ) -> BoxFuture<'a, ()>;
}

/// Fires off a transcription job for one question. The result arrives via
/// `TRANSCRIPTION_DONE`.
pub trait SpeechToText: Send + Sync {
    fn submit<'a>(
        &'a self,
        submission_key: &'a str,
        question_number: u32,
        audio_url: &'a str,
    ) -> BoxFuture<'a, ()>;
}

/// Pronunciation analysis is the one stage whose output gates fluency, so
/// it returns the word-level detail alongside the normalized sub-result
/// rather than just a [`SubResult`] (spec §4.6).
pub struct PronunciationOutcome {
    pub sub_result: SubResult,
    pub word_detail: Option<serde_json::Value>,
}

pub trait PronunciationAnalyzer: Send + Sync {
    fn analyze<'a>(
        &'a self,
        wav_path: &'a str,
        transcript: &'a str,
    ) -> BoxFuture<'a, PronunciationOutcome>;
}

/// Shared shape for the text-in/grade-out analyzers: grammar, lexical, and
/// vocabulary (spec §6).
pub trait TextAnalyzer: Send + Sync {
    fn analyze<'a>(&'a self, transcript: &'a str) -> BoxFuture<'a, SubResult>;
}

/// Fluency consumes pronunciation's word-level detail plus the transcript;
/// it never touches the local audio file (spec's Open Questions resolve
/// this as text-only).
pub trait FluencyAnalyzer: Send + Sync {
    fn analyze<'a>(
        &'a self,
        word_detail: &'a serde_json::Value,
        transcript: &'a str,
    ) -> BoxFuture<'a, SubResult>;
}
