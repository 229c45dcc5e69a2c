//! Thin adapters around the individual analysis endpoints, all explicitly
//! out of scope per spec §1: the concrete speech-recognition, pronunciation,
//! grammar, lexical, and vocabulary APIs, and the audio transcoder. Every
//! trait here is object-safe (hand-rolled boxed futures, no `async_trait`)
//! so the orchestrator can hold `Arc<dyn Trait>` and swap production HTTP
//! clients for fakes in tests.

mod http;
mod timeout;
mod traits;
mod vocabulary;

pub use http::{
    HttpAudioTranscoder, HttpFluencyAnalyzer, HttpPronunciationAnalyzer, HttpSpeechToText,
    HttpTextAnalyzer,
};
pub use timeout::{ANALYSIS_CALL_TIMEOUT, with_timeout};
pub use traits::{
    AudioTranscoder, BoxFuture, FluencyAnalyzer, PronunciationAnalyzer, PronunciationOutcome,
    SpeechToText, TextAnalyzer,
};
pub use vocabulary::VocabularyService;
