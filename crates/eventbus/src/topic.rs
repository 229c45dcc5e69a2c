use std::fmt;

/// The fixed set of logical event topics the core knows how to publish to.
/// The broker binding (queue name, exchange, whatever) is configurable and
/// lives in [`crate::client::TopicMap`]; this enum is what callers name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    StudentSubmission,
    AudioConversionDone,
    TranscriptionDone,
    QuestionAnalysisReady,
    PronunciationDone,
    GrammarDone,
    LexicalDone,
    VocabularyDone,
    FluencyDone,
    AnalysisComplete,
    SubmissionAnalysisComplete,
}

impl Topic {
    /// The canonical name used end-to-end. Per spec.md's open questions,
    /// `PRONUNCIATION_DONE` and `GRAMMAR_DONE` are the canonical spellings
    /// (not `PRONOUN_DONE` / `GRAMMER_DONE`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::StudentSubmission => "STUDENT_SUBMISSION",
            Self::AudioConversionDone => "AUDIO_CONVERSION_DONE",
            Self::TranscriptionDone => "TRANSCRIPTION_DONE",
            Self::QuestionAnalysisReady => "QUESTION_ANALYSIS_READY",
            Self::PronunciationDone => "PRONUNCIATION_DONE",
            Self::GrammarDone => "GRAMMAR_DONE",
            Self::LexicalDone => "LEXICAL_DONE",
            Self::VocabularyDone => "VOCABULARY_DONE",
            Self::FluencyDone => "FLUENCY_DONE",
            Self::AnalysisComplete => "ANALYSIS_COMPLETE",
            Self::SubmissionAnalysisComplete => "SUBMISSION_ANALYSIS_COMPLETE",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
