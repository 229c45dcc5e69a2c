use serde::Deserialize;
use serde_json::Value;

use results_store::SubResult;

use crate::traits::{
    AudioTranscoder, BoxFuture, FluencyAnalyzer, PronunciationAnalyzer, PronunciationOutcome,
    SpeechToText, TextAnalyzer,
};
use crate::vocabulary::VocabularyService;

/// Shared JSON shape every grammar/lexical/vocabulary/fluency endpoint is
/// expected to return on success (spec §6). A response missing `grade` or
/// `issues` is treated as a malformed upstream response rather than a
/// partial success.
#[derive(Deserialize)]
struct GradeResponse {
    grade: f64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    detail: serde_json::Map<String, Value>,
}

fn coerce_grade_response(client_name: &str, body: reqwest::Result<GradeResponse>) -> SubResult {
    match body {
        Ok(parsed) => SubResult::success(parsed.grade, parsed.issues, parsed.detail),
        Err(err) => {
            tracing::warn!(client = client_name, error = %err, "analysis_client_error");
            SubResult::error(format!("{client_name}_unavailable"))
        }
    }
}

/// Fires a conversion job at a transcoder service and forgets about it;
/// the real result arrives later via the `AUDIO_CONVERSION_DONE` webhook.
pub struct HttpAudioTranscoder {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAudioTranscoder {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl AudioTranscoder for HttpAudioTranscoder {
    fn submit<'a>(
        &'a self,
        submission_key: &'a str,
        question_number: u32,
        audio_url: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let result = self
                .http
                .post(format!("{}/convert", self.base_url))
                .json(&serde_json::json!({
                    "submission_url": submission_key,
                    "question_number": question_number,
                    "audio_url": audio_url,
                }))
                .send()
                .await;
            if let Err(err) = result {
                tracing::warn!(error = %err, "audio_transcoder_submit_failed");
            }
        })
    }
}

pub struct HttpSpeechToText {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSpeechToText {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl SpeechToText for HttpSpeechToText {
    fn submit<'a>(
        &'a self,
        submission_key: &'a str,
        question_number: u32,
        audio_url: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let result = self
                .http
                .post(format!("{}/transcribe", self.base_url))
                .json(&serde_json::json!({
                    "submission_url": submission_key,
                    "question_number": question_number,
                    "audio_url": audio_url,
                }))
                .send()
                .await;
            if let Err(err) = result {
                tracing::warn!(error = %err, "speech_to_text_submit_failed");
            }
        })
    }
}

#[derive(Deserialize)]
struct PronunciationResponse {
    grade: f64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    word_detail: Option<Value>,
}

/// Calls a synchronous pronunciation-scoring endpoint with the local WAV
/// path and reference transcript (spec §6's "consumes the local WAV").
pub struct HttpPronunciationAnalyzer {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPronunciationAnalyzer {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl PronunciationAnalyzer for HttpPronunciationAnalyzer {
    fn analyze<'a>(
        &'a self,
        wav_path: &'a str,
        transcript: &'a str,
    ) -> BoxFuture<'a, PronunciationOutcome> {
        Box::pin(async move {
            let response = self
                .http
                .post(format!("{}/pronunciation", self.base_url))
                .json(&serde_json::json!({
                    "wav_path": wav_path,
                    "transcript": transcript,
                }))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map(|r| r.json::<PronunciationResponse>());

            match response {
                Ok(parsing) => match parsing.await {
                    Ok(parsed) => PronunciationOutcome {
                        sub_result: SubResult::success(
                            parsed.grade,
                            parsed.issues,
                            Default::default(),
                        ),
                        word_detail: parsed.word_detail,
                    },
                    Err(err) => {
                        tracing::warn!(error = %err, "pronunciation_response_malformed");
                        PronunciationOutcome {
                            sub_result: SubResult::error("pronunciation_unavailable"),
                            word_detail: None,
                        }
                    }
                },
                Err(err) => {
                    tracing::warn!(error = %err, "pronunciation_call_failed");
                    PronunciationOutcome {
                        sub_result: SubResult::error("pronunciation_unavailable"),
                        word_detail: None,
                    }
                }
            }
        })
    }
}

/// Shared text-in/grade-out client, parameterized by endpoint path.
/// Backs grammar, lexical, and (minus the CEFR annotation step) vocabulary.
pub struct HttpTextAnalyzer {
    http: reqwest::Client,
    url: String,
    client_name: &'static str,
    annotate_vocabulary: bool,
}

impl HttpTextAnalyzer {
    pub fn grammar(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self::new(http, base_url, "grammar", false)
    }

    pub fn lexical(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self::new(http, base_url, "lexical", false)
    }

    pub fn vocabulary(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self::new(http, base_url, "vocabulary", true)
    }

    fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        client_name: &'static str,
        annotate_vocabulary: bool,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            http,
            url: format!("{base_url}/{client_name}"),
            client_name,
            annotate_vocabulary,
        }
    }
}

impl TextAnalyzer for HttpTextAnalyzer {
    fn analyze<'a>(&'a self, transcript: &'a str) -> BoxFuture<'a, SubResult> {
        Box::pin(async move {
            let response = self
                .http
                .post(&self.url)
                .json(&serde_json::json!({ "transcript": transcript }))
                .send()
                .await
                .and_then(|r| r.error_for_status());

            let parsed = match response {
                Ok(r) => r.json::<GradeResponse>().await,
                Err(err) => Err(err),
            };

            let mut result = coerce_grade_response(self.client_name, parsed);
            if self.annotate_vocabulary {
                if let SubResult::Success { detail, .. } = &mut result {
                    let cefr = VocabularyService::get().annotate(transcript);
                    detail.insert(
                        "cefr_levels".to_string(),
                        serde_json::to_value(cefr).unwrap_or_default(),
                    );
                }
            }
            result
        })
    }
}

/// Fluency receives pronunciation's word-level detail, never the audio
/// file directly (resolved Open Question, spec §9).
pub struct HttpFluencyAnalyzer {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFluencyAnalyzer {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl FluencyAnalyzer for HttpFluencyAnalyzer {
    fn analyze<'a>(&'a self, word_detail: &'a Value, transcript: &'a str) -> BoxFuture<'a, SubResult> {
        Box::pin(async move {
            let response = self
                .http
                .post(format!("{}/fluency", self.base_url))
                .json(&serde_json::json!({
                    "word_detail": word_detail,
                    "transcript": transcript,
                }))
                .send()
                .await
                .and_then(|r| r.error_for_status());

            let parsed = match response {
                Ok(r) => r.json::<GradeResponse>().await,
                Err(err) => Err(err),
            };
            coerce_grade_response("fluency", parsed)
        })
    }
}
