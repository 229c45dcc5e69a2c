use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use eventbus::{EventPublisher, Topic};
use persistence::SubmissionRepository;
use results_store::{BeginFinalize, DurationFeedback, QuestionResult, ResultsStore};

/// Per-submission fan-in of all question completions; computes the final
/// result, persists it, and emits `SUBMISSION_ANALYSIS_COMPLETE` exactly
/// once per submission (spec §4.7).
pub struct SubmissionAggregator {
    results_store: Arc<ResultsStore>,
    repository: Arc<dyn SubmissionRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl SubmissionAggregator {
    pub fn new(
        results_store: Arc<ResultsStore>,
        repository: Arc<dyn SubmissionRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            results_store,
            repository,
            publisher,
        }
    }

    pub async fn on_analysis_complete(
        &self,
        submission_key: &str,
        question_number: u32,
        total_questions: u32,
        question_result: QuestionResult,
    ) {
        self.results_store
            .store(submission_key, total_questions, question_number, question_result)
            .await;

        match self.results_store.begin_finalize(submission_key).await {
            BeginFinalize::Claimed => {}
            BeginFinalize::NotReady
            | BeginFinalize::AlreadyFinalizing
            | BeginFinalize::AlreadyFinalized => return,
        }

        self.finalize(submission_key, total_questions).await;
    }

    /// Runs once this submission has won the finalize claim: computes
    /// duration feedback per question, persists the aggregate with
    /// bounded retry, and either completes or marks the failure — all
    /// outside the Results Store's lock (spec §5).
    async fn finalize(&self, submission_key: &str, total_questions: u32) {
        let mut results = match self.results_store.get_transformed(submission_key).await {
            Ok(results) => results,
            Err(err) => {
                tracing::error!(submission_key, error = %err, "finalize_read_back_failed");
                self.results_store.complete_finalize(submission_key, false).await;
                return;
            }
        };

        for result in &mut results {
            result.duration_feedback = Some(self.duration_feedback(submission_key, result).await);
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(1600))
            .with_max_times(3);

        let save_result = (|| async {
            self.repository
                .save_submission_results(submission_key, total_questions, &results)
                .await
        })
        .retry(backoff)
        .notify(|err, delay| {
            tracing::warn!(submission_key, error = %err, delay_ms = delay.as_millis(), "retrying_submission_finalize_write");
        })
        .await;

        match save_result {
            Ok(()) => {
                self.results_store.complete_finalize(submission_key, true).await;
                let payload = serde_json::json!({
                    "submission_url": submission_key,
                    "total_questions": total_questions,
                    "results": results,
                });
                self.publisher
                    .publish(Topic::SubmissionAnalysisComplete, &payload)
                    .await;
            }
            Err(err) => {
                self.results_store.complete_finalize(submission_key, false).await;
                tracing::error!(
                    submission_key,
                    error = %err,
                    "submission_finalize_write_failed_terminal"
                );
            }
        }
    }

    /// `r = audio_duration / (60 * time_limit_minutes) * 100` (spec
    /// §4.7's duration feedback rule).
    async fn duration_feedback(&self, submission_key: &str, result: &QuestionResult) -> DurationFeedback {
        let time_limit = self
            .repository
            .question_time_limit(submission_key, result.question_number)
            .await
            .ok()
            .flatten();

        match time_limit {
            Some(t) if t > 0.0 => {
                let ratio = result.audio_duration / (60.0 * t) * 100.0;
                let message = if ratio < 50.0 {
                    "Did not speak that much."
                } else if ratio <= 100.0 {
                    "User spoke longer."
                } else {
                    "User exceeded the time limit."
                };
                DurationFeedback::Message(message.to_string())
            }
            _ => DurationFeedback::Error {
                error: "no_time_limit".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventbus::RecordingEventBus;
    use persistence::FakeSubmissionRepository;
    use results_store::SubResult;

    fn question(number: u32, duration: f64) -> QuestionResult {
        let sub = SubResult::success(80.0, vec![], Default::default());
        QuestionResult {
            submission_key: "s1".to_string(),
            question_number: number,
            pronunciation: sub.clone(),
            grammar: sub.clone(),
            lexical: sub.clone(),
            vocabulary: sub.clone(),
            fluency: sub,
            transcript: "hello world".to_string(),
            audio_duration: duration,
            duration_feedback: None,
        }
    }

    fn harness() -> (
        SubmissionAggregator,
        Arc<RecordingEventBus>,
        Arc<FakeSubmissionRepository>,
        Arc<ResultsStore>,
    ) {
        let bus = Arc::new(RecordingEventBus::new());
        let repo = Arc::new(FakeSubmissionRepository::new());
        let store = Arc::new(ResultsStore::new());
        let aggregator = SubmissionAggregator::new(store.clone(), repo.clone(), bus.clone());
        (aggregator, bus, repo, store)
    }

    #[tokio::test]
    async fn finalizes_only_after_all_questions_land() {
        let (aggregator, bus, repo, _store) = harness();
        repo.set_time_limit("s1", 1, 2.0);
        repo.set_time_limit("s1", 2, 2.0);

        aggregator
            .on_analysis_complete("s1", 1, 2, question(1, 30.0))
            .await;
        assert_eq!(bus.count(Topic::SubmissionAnalysisComplete), 0);

        aggregator
            .on_analysis_complete("s1", 2, 2, question(2, 30.0))
            .await;
        assert_eq!(bus.count(Topic::SubmissionAnalysisComplete), 1);

        let saved = repo.saved_results("s1").await.unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].duration_feedback.is_some());
    }

    #[tokio::test]
    async fn missing_time_limit_produces_no_time_limit_error() {
        let (aggregator, _bus, repo, _store) = harness();
        aggregator
            .on_analysis_complete("s1", 1, 1, question(1, 30.0))
            .await;

        let saved = repo.saved_results("s1").await.unwrap();
        assert!(matches!(
            &saved[0].duration_feedback,
            Some(DurationFeedback::Error { error }) if error == "no_time_limit"
        ));
    }

    #[tokio::test]
    async fn duration_feedback_boundaries() {
        let (aggregator, _bus, repo, _store) = harness();
        repo.set_time_limit("s1", 1, 1.0);
        aggregator
            .on_analysis_complete("s1", 1, 1, question(1, 29.0))
            .await;
        let saved = repo.saved_results("s1").await.unwrap();
        assert!(matches!(
            &saved[0].duration_feedback,
            Some(DurationFeedback::Message(m)) if m == "Did not speak that much."
        ));
    }

    #[tokio::test]
    async fn terminal_save_failure_marks_finalization_failed_not_finalized() {
        let (aggregator, bus, repo, store) = harness();
        repo.set_time_limit("s1", 1, 1.0);
        repo.fail_saves(true);

        aggregator
            .on_analysis_complete("s1", 1, 1, question(1, 30.0))
            .await;

        assert_eq!(bus.count(Topic::SubmissionAnalysisComplete), 0);
        let aggregate = store.get_raw("s1").await.unwrap();
        assert!(!aggregate.finalized);
        assert!(aggregate.finalization_failed);
    }

    #[tokio::test]
    async fn duplicate_analysis_complete_does_not_double_finalize() {
        let (aggregator, bus, _repo, _store) = harness();
        aggregator
            .on_analysis_complete("s1", 1, 1, question(1, 30.0))
            .await;
        aggregator
            .on_analysis_complete("s1", 1, 1, question(1, 30.0))
            .await;
        assert_eq!(bus.count(Topic::SubmissionAnalysisComplete), 1);
    }
}
