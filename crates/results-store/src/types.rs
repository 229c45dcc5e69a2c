use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type SubmissionKey = String;
pub type QuestionNumber = u32;

/// Uniquely identifies one recording to analyze within a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionKey {
    pub submission_key: SubmissionKey,
    pub question_number: QuestionNumber,
}

impl QuestionKey {
    pub fn new(submission_key: impl Into<SubmissionKey>, question_number: QuestionNumber) -> Self {
        Self {
            submission_key: submission_key.into(),
            question_number,
        }
    }
}

impl std::fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.submission_key, self.question_number)
    }
}

/// An analysis sub-result, coerced to one of two shapes before it is ever
/// persisted or returned: a success grade+issues+detail, or a bare error
/// string. Missing sub-results are coerced to [`SubResult::Error`] before
/// storage (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SubResult {
    Success {
        grade: f64,
        issues: Vec<String>,
        #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
        detail: serde_json::Map<String, serde_json::Value>,
    },
    Error {
        error: String,
    },
}

impl SubResult {
    pub fn success(grade: f64, issues: Vec<String>, detail: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::Success {
            grade,
            issues,
            detail,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Feedback comparing a question's spoken duration against its configured
/// time limit (spec §4.7 "Duration feedback rule"). Absent/non-positive
/// time limits coerce to the error shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DurationFeedback {
    Message(String),
    Error { error: String },
}

/// One question's consolidated analysis result. `duration_feedback` is
/// `None` until the Submission Aggregator fills it in at finalize time
/// (it depends on the per-question time limit, which lives in the
/// database — an external collaborator the orchestrator never touches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResult {
    pub submission_key: SubmissionKey,
    pub question_number: QuestionNumber,
    pub pronunciation: SubResult,
    pub grammar: SubResult,
    pub lexical: SubResult,
    pub vocabulary: SubResult,
    pub fluency: SubResult,
    pub transcript: String,
    pub audio_duration: f64,
    #[serde(default)]
    pub duration_feedback: Option<DurationFeedback>,
}

impl QuestionResult {
    /// Whether any of the five analyses recorded an error. Used by the
    /// Results Store to decide whether a later write may upgrade an
    /// earlier one (spec §4.3).
    pub fn has_error(&self) -> bool {
        [
            &self.pronunciation,
            &self.grammar,
            &self.lexical,
            &self.vocabulary,
            &self.fluency,
        ]
        .into_iter()
        .any(SubResult::is_error)
    }
}

/// Per-submission aggregate held by the Results Store. `finalizing` is not
/// part of the spec's data model; it is the short-lived claim flag that
/// lets the finalize check-and-flip happen under a lock while the actual
/// database write happens outside it (spec §5: no critical section may
/// span an outbound call).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAggregate {
    pub submission_key: SubmissionKey,
    pub total_questions: u32,
    pub results: HashMap<QuestionNumber, QuestionResult>,
    pub finalized: bool,
    #[serde(default)]
    pub finalizing: bool,
    #[serde(default)]
    pub finalization_failed: bool,
}

impl SubmissionAggregate {
    pub fn new(submission_key: SubmissionKey, total_questions: u32) -> Self {
        Self {
            submission_key,
            total_questions,
            results: HashMap::new(),
            finalized: false,
            finalizing: false,
            finalization_failed: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() as u32 >= self.total_questions
    }

    /// The canonical, ascending-question-order view used by
    /// `get_transformed` and by the final submission payload.
    pub fn transformed(&self) -> Vec<QuestionResult> {
        let mut numbers: Vec<&QuestionNumber> = self.results.keys().collect();
        numbers.sort();
        numbers
            .into_iter()
            .map(|n| self.results[n].clone())
            .collect()
    }
}
