use std::collections::HashMap;

use results_store::QuestionResult;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::repository::{BoxFuture, SubmissionRepository};

/// In-memory stand-in for [`crate::PostgresSubmissionRepository`], used by
/// component tests that drive the Submission Aggregator without a
/// database.
#[derive(Default)]
pub struct FakeSubmissionRepository {
    saved: Mutex<HashMap<String, Vec<QuestionResult>>>,
    time_limits: Mutex<HashMap<(String, u32), f64>>,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl FakeSubmissionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time_limit(&self, submission_key: &str, question_number: u32, minutes: f64) {
        self.time_limits
            .try_lock()
            .expect("uncontended in tests")
            .insert((submission_key.to_string(), question_number), minutes);
    }

    /// Makes the next `save_submission_results` calls fail, to exercise
    /// the finalize retry/backoff path.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn saved_results(&self, submission_key: &str) -> Option<Vec<QuestionResult>> {
        self.saved.lock().await.get(submission_key).cloned()
    }
}

impl SubmissionRepository for FakeSubmissionRepository {
    fn save_submission_results<'a>(
        &'a self,
        submission_key: &'a str,
        _total_questions: u32,
        results: &'a [QuestionResult],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(crate::error::PersistenceError::Database(
                    "injected test failure".to_string(),
                ));
            }
            self.saved
                .lock()
                .await
                .insert(submission_key.to_string(), results.to_vec());
            Ok(())
        })
    }

    fn question_time_limit<'a>(
        &'a self,
        submission_key: &'a str,
        question_number: u32,
    ) -> BoxFuture<'a, Result<Option<f64>>> {
        Box::pin(async move {
            Ok(self
                .time_limits
                .lock()
                .await
                .get(&(submission_key.to_string(), question_number))
                .copied())
        })
    }
}
