use std::collections::HashMap;
use std::sync::Arc;

use analysis_clients::{ANALYSIS_CALL_TIMEOUT, FluencyAnalyzer, PronunciationAnalyzer, PronunciationOutcome, TextAnalyzer, with_timeout};
use eventbus::{EventPublisher, Topic};
use file_sessions::FileSessionManager;
use results_store::{QuestionKey, QuestionResult, ResultsStore, SubResult};
use tokio::sync::{Mutex, RwLock};

use crate::types::{AnalysisState, QuestionReadyPayload};

/// Per-question fan-out to the four analysis stages, with fluency gated
/// on pronunciation, and fan-in of their five completions into one
/// `ANALYSIS_COMPLETE` (spec §4.6).
pub struct AnalysisOrchestrator {
    states: RwLock<HashMap<QuestionKey, Arc<Mutex<AnalysisState>>>>,
    publisher: Arc<dyn EventPublisher>,
    results_store: Arc<ResultsStore>,
    file_sessions: Arc<FileSessionManager>,
    pronunciation: Arc<dyn PronunciationAnalyzer>,
    grammar: Arc<dyn TextAnalyzer>,
    lexical: Arc<dyn TextAnalyzer>,
    vocabulary: Arc<dyn TextAnalyzer>,
    fluency: Arc<dyn FluencyAnalyzer>,
}

impl AnalysisOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        results_store: Arc<ResultsStore>,
        file_sessions: Arc<FileSessionManager>,
        pronunciation: Arc<dyn PronunciationAnalyzer>,
        grammar: Arc<dyn TextAnalyzer>,
        lexical: Arc<dyn TextAnalyzer>,
        vocabulary: Arc<dyn TextAnalyzer>,
        fluency: Arc<dyn FluencyAnalyzer>,
    ) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            publisher,
            results_store,
            file_sessions,
            pronunciation,
            grammar,
            lexical,
            vocabulary,
            fluency,
        }
    }

    async fn cell_for(&self, key: &QuestionKey, payload: &QuestionReadyPayload) -> Arc<Mutex<AnalysisState>> {
        if let Some(cell) = self.states.read().await.get(key) {
            return cell.clone();
        }
        let mut guard = self.states.write().await;
        guard
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(AnalysisState::new(payload))))
            .clone()
    }

    /// Entry point. Spawns the four-way fan-out as a background task so
    /// the webhook handler can return immediately (spec §4.8's
    /// asynchronous dispatch option); the caller is not blocked on any of
    /// the four outbound analysis calls.
    pub fn on_analysis_ready(self: &Arc<Self>, payload: QuestionReadyPayload) {
        let this = self.clone();
        tokio::spawn(async move {
            this.run(payload).await;
        });
    }

    async fn run(self: Arc<Self>, payload: QuestionReadyPayload) {
        let key = QuestionKey::new(payload.submission_key.clone(), payload.question_number);
        let cell = self.cell_for(&key, &payload).await;

        let pronunciation = self.clone();
        let pronunciation_key = key.clone();
        let pronunciation_cell = cell.clone();
        let pronunciation_task = tokio::spawn(async move {
            pronunciation
                .run_pronunciation_then_fluency(pronunciation_key, pronunciation_cell)
                .await;
        });

        let grammar = self.clone();
        let grammar_key = key.clone();
        let grammar_cell = cell.clone();
        let grammar_task = tokio::spawn(async move {
            grammar.run_grammar(grammar_key, grammar_cell).await;
        });

        let lexical = self.clone();
        let lexical_key = key.clone();
        let lexical_cell = cell.clone();
        let lexical_task = tokio::spawn(async move {
            lexical.run_lexical(lexical_key, lexical_cell).await;
        });

        let vocabulary = self.clone();
        let vocabulary_key = key.clone();
        let vocabulary_cell = cell.clone();
        let vocabulary_task = tokio::spawn(async move {
            vocabulary.run_vocabulary(vocabulary_key, vocabulary_cell).await;
        });

        let _ = tokio::join!(pronunciation_task, grammar_task, lexical_task, vocabulary_task);
    }

    async fn run_pronunciation_then_fluency(&self, key: QuestionKey, cell: Arc<Mutex<AnalysisState>>) {
        let (wav_path, transcript) = {
            let state = cell.lock().await;
            (state.wav_path.clone(), state.transcript.clone())
        };

        let outcome = match tokio::time::timeout(
            ANALYSIS_CALL_TIMEOUT,
            self.pronunciation.analyze(&wav_path, &transcript),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => PronunciationOutcome {
                sub_result: SubResult::error("timeout"),
                word_detail: None,
            },
        };

        let complete_snapshot = {
            let mut state = cell.lock().await;
            if state.pronunciation.is_none() {
                state.pronunciation = Some(outcome.sub_result.clone());
                state.pronunciation_word_detail = outcome.word_detail.clone();
            }
            self.maybe_claim_complete(&key, &mut state)
        };

        self.publish_done(Topic::PronunciationDone, &key, &outcome.sub_result)
            .await;
        self.file_sessions
            .mark_service_complete(&cell_session_id(&cell).await, "pronunciation")
            .await;

        if let Some(result) = complete_snapshot {
            self.finish(&key, result).await;
            return;
        }

        let fluency_result = match outcome.word_detail {
            Some(word_detail) => with_timeout(self.fluency.analyze(&word_detail, &transcript)).await,
            None => SubResult::error("no_pronunciation_detail"),
        };

        let complete_snapshot = {
            let mut state = cell.lock().await;
            if state.fluency.is_none() {
                state.fluency = Some(fluency_result.clone());
            }
            self.maybe_claim_complete(&key, &mut state)
        };

        self.publish_done(Topic::FluencyDone, &key, &fluency_result)
            .await;

        if let Some(result) = complete_snapshot {
            self.finish(&key, result).await;
        }
    }

    async fn run_grammar(&self, key: QuestionKey, cell: Arc<Mutex<AnalysisState>>) {
        let transcript = cell.lock().await.transcript.clone();
        let result = with_timeout(self.grammar.analyze(&transcript)).await;
        self.record_and_maybe_finish(&key, &cell, Topic::GrammarDone, result, |state, r| {
            state.grammar = Some(r)
        })
        .await;
    }

    async fn run_lexical(&self, key: QuestionKey, cell: Arc<Mutex<AnalysisState>>) {
        let transcript = cell.lock().await.transcript.clone();
        let result = with_timeout(self.lexical.analyze(&transcript)).await;
        self.record_and_maybe_finish(&key, &cell, Topic::LexicalDone, result, |state, r| {
            state.lexical = Some(r)
        })
        .await;
    }

    async fn run_vocabulary(&self, key: QuestionKey, cell: Arc<Mutex<AnalysisState>>) {
        let transcript = cell.lock().await.transcript.clone();
        let result = with_timeout(self.vocabulary.analyze(&transcript)).await;
        self.record_and_maybe_finish(&key, &cell, Topic::VocabularyDone, result, |state, r| {
            state.vocabulary = Some(r)
        })
        .await;
    }

    async fn record_and_maybe_finish(
        &self,
        key: &QuestionKey,
        cell: &Arc<Mutex<AnalysisState>>,
        topic: Topic,
        result: SubResult,
        set: impl FnOnce(&mut AnalysisState, SubResult),
    ) {
        let complete_snapshot = {
            let mut state = cell.lock().await;
            set(&mut state, result.clone());
            self.maybe_claim_complete(key, &mut state)
        };

        self.publish_done(topic, key, &result).await;

        if let Some(result) = complete_snapshot {
            self.finish(key, result).await;
        }
    }

    /// Under the caller's lock: if all five stages are done and this
    /// AnalysisState hasn't emitted yet, claim the single-shot emit and
    /// build the `QuestionResult`. The actual store-write and publish
    /// happen after the lock is released (spec §5).
    fn maybe_claim_complete(&self, key: &QuestionKey, state: &mut AnalysisState) -> Option<QuestionResult> {
        if !state.is_done() || state.emitted_complete {
            return None;
        }
        state.emitted_complete = true;

        Some(QuestionResult {
            submission_key: key.submission_key.clone(),
            question_number: key.question_number,
            pronunciation: state.pronunciation.clone().expect("pronunciation present"),
            grammar: state.grammar.clone().expect("grammar present"),
            lexical: state.lexical.clone().expect("lexical present"),
            vocabulary: state.vocabulary.clone().expect("vocabulary present"),
            fluency: state.fluency.clone().expect("fluency present"),
            transcript: state.transcript.clone(),
            audio_duration: state.audio_duration,
            duration_feedback: None,
        })
    }

    async fn finish(&self, key: &QuestionKey, result: QuestionResult) {
        let total_questions = {
            let guard = self.states.read().await;
            match guard.get(key) {
                Some(cell) => cell.lock().await.total_questions,
                None => 1,
            }
        };

        self.results_store
            .store(&key.submission_key, total_questions, key.question_number, result.clone())
            .await;

        let payload = serde_json::json!({
            "submission_url": key.submission_key,
            "question_number": key.question_number,
            "total_questions": total_questions,
            "result": result,
        });
        self.publisher.publish(Topic::AnalysisComplete, &payload).await;
    }

    async fn publish_done(&self, topic: Topic, key: &QuestionKey, result: &SubResult) {
        let payload = serde_json::json!({
            "submission_url": key.submission_key,
            "question_number": key.question_number,
            "result": result,
        });
        self.publisher.publish(topic, &payload).await;
    }
}

async fn cell_session_id(cell: &Arc<Mutex<AnalysisState>>) -> String {
    cell.lock().await.session_id.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_clients::{BoxFuture, PronunciationOutcome};
    use eventbus::RecordingEventBus;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedPronunciation {
        word_detail: Option<serde_json::Value>,
    }
    impl PronunciationAnalyzer for FixedPronunciation {
        fn analyze<'a>(&'a self, _wav: &'a str, _transcript: &'a str) -> BoxFuture<'a, PronunciationOutcome> {
            Box::pin(async move {
                PronunciationOutcome {
                    sub_result: SubResult::success(80.0, vec![], Default::default()),
                    word_detail: self.word_detail.clone(),
                }
            })
        }
    }

    struct FixedText {
        calls: AtomicUsize,
    }
    impl TextAnalyzer for FixedText {
        fn analyze<'a>(&'a self, _transcript: &'a str) -> BoxFuture<'a, SubResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { SubResult::success(70.0, vec![], Default::default()) })
        }
    }

    struct FixedFluency;
    impl FluencyAnalyzer for FixedFluency {
        fn analyze<'a>(&'a self, _wd: &'a serde_json::Value, _t: &'a str) -> BoxFuture<'a, SubResult> {
            Box::pin(async move { SubResult::success(60.0, vec![], Default::default()) })
        }
    }

    struct SlowPronunciation;
    impl PronunciationAnalyzer for SlowPronunciation {
        fn analyze<'a>(&'a self, _wav: &'a str, _transcript: &'a str) -> BoxFuture<'a, PronunciationOutcome> {
            Box::pin(async move {
                tokio::time::sleep(ANALYSIS_CALL_TIMEOUT * 10).await;
                PronunciationOutcome {
                    sub_result: SubResult::success(80.0, vec![], Default::default()),
                    word_detail: Some(json!([{"word": "hello"}])),
                }
            })
        }
    }

    fn harness(word_detail: Option<serde_json::Value>) -> (Arc<AnalysisOrchestrator>, Arc<RecordingEventBus>, Arc<ResultsStore>) {
        let bus = Arc::new(RecordingEventBus::new());
        let store = Arc::new(ResultsStore::default());
        let sessions = Arc::new(FileSessionManager::new());
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            bus.clone(),
            store.clone(),
            sessions,
            Arc::new(FixedPronunciation { word_detail }),
            Arc::new(FixedText { calls: AtomicUsize::new(0) }),
            Arc::new(FixedText { calls: AtomicUsize::new(0) }),
            Arc::new(FixedText { calls: AtomicUsize::new(0) }),
            Arc::new(FixedFluency),
        ));
        (orchestrator, bus, store)
    }

    fn payload() -> QuestionReadyPayload {
        QuestionReadyPayload {
            submission_key: "s1".into(),
            question_number: 1,
            total_questions: 1,
            session_id: "sess1".into(),
            wav_path: "/tmp/a.wav".into(),
            audio_duration: 30.0,
            transcript: "hello world".into(),
            word_details: json!([]),
            error: None,
        }
    }

    #[tokio::test]
    async fn emits_analysis_complete_exactly_once_with_fluency() {
        let (orchestrator, bus, store) = harness(Some(json!([{"word": "hello"}])));
        orchestrator.clone().run(payload()).await;

        assert_eq!(bus.count(Topic::AnalysisComplete), 1);
        assert_eq!(bus.count(Topic::PronunciationDone), 1);
        assert_eq!(bus.count(Topic::FluencyDone), 1);
        assert_eq!(bus.count(Topic::GrammarDone), 1);
        assert_eq!(bus.count(Topic::LexicalDone), 1);
        assert_eq!(bus.count(Topic::VocabularyDone), 1);

        let aggregate = store.get_raw("s1").await.unwrap();
        assert!(aggregate.results.contains_key(&1));
    }

    #[tokio::test]
    async fn missing_word_detail_records_fluency_error() {
        let (orchestrator, _bus, store) = harness(None);
        orchestrator.clone().run(payload()).await;

        let aggregate = store.get_raw("s1").await.unwrap();
        let result = &aggregate.results[&1];
        assert!(matches!(&result.fluency, SubResult::Error { error } if error == "no_pronunciation_detail"));
    }

    #[tokio::test]
    async fn pronunciation_call_exceeding_hard_timeout_records_timeout_error() {
        tokio::time::pause();
        let bus = Arc::new(RecordingEventBus::new());
        let store = Arc::new(ResultsStore::default());
        let sessions = Arc::new(FileSessionManager::new());
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            bus.clone(),
            store.clone(),
            sessions,
            Arc::new(SlowPronunciation),
            Arc::new(FixedText { calls: AtomicUsize::new(0) }),
            Arc::new(FixedText { calls: AtomicUsize::new(0) }),
            Arc::new(FixedText { calls: AtomicUsize::new(0) }),
            Arc::new(FixedFluency),
        ));

        let run = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.run(payload()).await }
        });

        tokio::time::advance(ANALYSIS_CALL_TIMEOUT + Duration::from_secs(1)).await;
        run.await.unwrap();

        let aggregate = store.get_raw("s1").await.unwrap();
        let result = &aggregate.results[&1];
        assert!(matches!(&result.pronunciation, SubResult::Error { error } if error == "timeout"));
        assert!(matches!(&result.fluency, SubResult::Error { error } if error == "no_pronunciation_detail"));
        assert_eq!(bus.count(Topic::AnalysisComplete), 1);
    }
}
