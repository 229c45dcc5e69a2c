use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, ResultsStoreError};
use crate::types::{QuestionNumber, QuestionResult, SubmissionAggregate, SubmissionKey};

/// Outcome of a `store` call, surfaced for logging and for tests that
/// assert the first-writer-wins-unless-upgrading-error-to-success rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted,
    UpgradedErrorToSuccess,
    DroppedNotAnUpgrade,
    DroppedFinalized,
}

/// Outcome of attempting to claim the finalize slot for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginFinalize {
    /// This call won the claim; the caller must run its DB write and then
    /// call `complete_finalize`.
    Claimed,
    NotReady,
    AlreadyFinalizing,
    AlreadyFinalized,
}

/// Process-local, concurrency-safe mapping from `SubmissionKey` to
/// `SubmissionAggregate` (spec §4.3). Each submission's aggregate lives
/// behind its own `tokio::sync::Mutex`, reached through a `RwLock`-guarded
/// directory, so concurrent writers for different submissions never
/// contend and two writers for the same question serialize through the
/// same per-submission lock.
#[derive(Default)]
pub struct ResultsStore {
    aggregates: RwLock<HashMap<SubmissionKey, Arc<Mutex<SubmissionAggregate>>>>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn cell_for(
        &self,
        submission_key: &str,
        total_questions: u32,
    ) -> Arc<Mutex<SubmissionAggregate>> {
        if let Some(cell) = self.aggregates.read().await.get(submission_key) {
            return cell.clone();
        }

        let mut guard = self.aggregates.write().await;
        guard
            .entry(submission_key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SubmissionAggregate::new(
                    submission_key.to_string(),
                    total_questions,
                )))
            })
            .clone()
    }

    /// Idempotently inserts `question_result` under `question_number`.
    /// `total_questions` is sourced from the triggering `ANALYSIS_COMPLETE`
    /// event and establishes the aggregate on first write; later calls for
    /// the same submission never lower it.
    pub async fn store(
        &self,
        submission_key: &str,
        total_questions: u32,
        question_number: QuestionNumber,
        question_result: QuestionResult,
    ) -> StoreOutcome {
        let cell = self.cell_for(submission_key, total_questions).await;
        let mut aggregate = cell.lock().await;

        if aggregate.finalized {
            tracing::debug!(
                submission_key,
                question_number,
                "results_store_write_ignored_finalized"
            );
            return StoreOutcome::DroppedFinalized;
        }

        match aggregate.results.get(&question_number) {
            None => {
                aggregate.results.insert(question_number, question_result);
                StoreOutcome::Inserted
            }
            Some(existing) if existing.has_error() && !question_result.has_error() => {
                aggregate.results.insert(question_number, question_result);
                StoreOutcome::UpgradedErrorToSuccess
            }
            Some(_) => StoreOutcome::DroppedNotAnUpgrade,
        }
    }

    pub async fn get_raw(&self, submission_key: &str) -> Result<SubmissionAggregate> {
        let guard = self.aggregates.read().await;
        let cell = guard
            .get(submission_key)
            .ok_or_else(|| ResultsStoreError::NotFound(submission_key.to_string()))?
            .clone();
        drop(guard);
        Ok(cell.lock().await.clone())
    }

    pub async fn get_transformed(&self, submission_key: &str) -> Result<Vec<QuestionResult>> {
        Ok(self.get_raw(submission_key).await?.transformed())
    }

    pub async fn list_all(&self) -> Vec<SubmissionKey> {
        self.aggregates.read().await.keys().cloned().collect()
    }

    pub async fn has(&self, submission_key: &str) -> bool {
        self.aggregates.read().await.contains_key(submission_key)
    }

    pub async fn clear(&self, submission_key: &str) {
        self.aggregates.write().await.remove(submission_key);
    }

    /// Claim the finalize slot for `submission_key`, if the aggregate is
    /// complete, not already finalized, and no other caller is currently
    /// finalizing it. The caller must follow a `Claimed` result with
    /// exactly one call to [`Self::complete_finalize`].
    pub async fn begin_finalize(&self, submission_key: &str) -> BeginFinalize {
        let Some(cell) = self.aggregates.read().await.get(submission_key).cloned() else {
            return BeginFinalize::NotReady;
        };
        let mut aggregate = cell.lock().await;

        if aggregate.finalized {
            return BeginFinalize::AlreadyFinalized;
        }
        if aggregate.finalizing {
            return BeginFinalize::AlreadyFinalizing;
        }
        if !aggregate.is_complete() {
            return BeginFinalize::NotReady;
        }

        aggregate.finalizing = true;
        BeginFinalize::Claimed
    }

    /// Release the finalize slot claimed by [`Self::begin_finalize`].
    /// `success = true` flips `finalized` permanently; `success = false`
    /// marks `finalization_failed` and leaves `finalized` false so a
    /// manual retry can re-run the step (spec §4.7).
    pub async fn complete_finalize(&self, submission_key: &str, success: bool) {
        let Some(cell) = self.aggregates.read().await.get(submission_key).cloned() else {
            return;
        };
        let mut aggregate = cell.lock().await;
        aggregate.finalizing = false;
        if success {
            aggregate.finalized = true;
            aggregate.finalization_failed = false;
        } else {
            aggregate.finalization_failed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubResult;

    fn result(submission_key: &str, question_number: u32, error: bool) -> QuestionResult {
        let sub = if error {
            SubResult::error("boom")
        } else {
            SubResult::success(90.0, vec![], Default::default())
        };
        QuestionResult {
            submission_key: submission_key.to_string(),
            question_number,
            pronunciation: sub.clone(),
            grammar: sub.clone(),
            lexical: sub.clone(),
            vocabulary: sub.clone(),
            fluency: sub,
            transcript: "hello".to_string(),
            audio_duration: 10.0,
            duration_feedback: None,
        }
    }

    #[tokio::test]
    async fn first_write_is_inserted() {
        let store = ResultsStore::new();
        let outcome = store.store("s1", 1, 1, result("s1", 1, false)).await;
        assert_eq!(outcome, StoreOutcome::Inserted);
    }

    #[tokio::test]
    async fn duplicate_success_write_is_dropped() {
        let store = ResultsStore::new();
        store.store("s1", 1, 1, result("s1", 1, false)).await;
        let outcome = store.store("s1", 1, 1, result("s1", 1, false)).await;
        assert_eq!(outcome, StoreOutcome::DroppedNotAnUpgrade);
    }

    #[tokio::test]
    async fn error_then_success_upgrades() {
        let store = ResultsStore::new();
        store.store("s1", 1, 1, result("s1", 1, true)).await;
        let outcome = store.store("s1", 1, 1, result("s1", 1, false)).await;
        assert_eq!(outcome, StoreOutcome::UpgradedErrorToSuccess);
    }

    #[tokio::test]
    async fn success_then_error_is_dropped() {
        let store = ResultsStore::new();
        store.store("s1", 1, 1, result("s1", 1, false)).await;
        let outcome = store.store("s1", 1, 1, result("s1", 1, true)).await;
        assert_eq!(outcome, StoreOutcome::DroppedNotAnUpgrade);
    }

    #[tokio::test]
    async fn finalize_claim_is_single_shot() {
        let store = ResultsStore::new();
        store.store("s1", 1, 1, result("s1", 1, false)).await;
        assert_eq!(store.begin_finalize("s1").await, BeginFinalize::Claimed);
        assert_eq!(
            store.begin_finalize("s1").await,
            BeginFinalize::AlreadyFinalizing
        );
        store.complete_finalize("s1", true).await;
        assert_eq!(
            store.begin_finalize("s1").await,
            BeginFinalize::AlreadyFinalized
        );
    }

    #[tokio::test]
    async fn writes_after_finalize_are_dropped() {
        let store = ResultsStore::new();
        store.store("s1", 1, 1, result("s1", 1, false)).await;
        store.begin_finalize("s1").await;
        store.complete_finalize("s1", true).await;
        let outcome = store.store("s1", 1, 1, result("s1", 1, false)).await;
        assert_eq!(outcome, StoreOutcome::DroppedFinalized);
    }

    #[tokio::test]
    async fn not_ready_until_all_questions_present() {
        let store = ResultsStore::new();
        store.store("s1", 2, 1, result("s1", 1, false)).await;
        assert_eq!(store.begin_finalize("s1").await, BeginFinalize::NotReady);
    }

    #[tokio::test]
    async fn get_transformed_is_ordered_by_question_number() {
        let store = ResultsStore::new();
        store.store("s1", 3, 2, result("s1", 2, false)).await;
        store.store("s1", 3, 3, result("s1", 3, false)).await;
        store.store("s1", 3, 1, result("s1", 1, false)).await;
        let transformed = store.get_transformed("s1").await.unwrap();
        let numbers: Vec<u32> = transformed.iter().map(|r| r.question_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn get_raw_missing_submission_is_not_found() {
        let store = ResultsStore::new();
        assert!(matches!(
            store.get_raw("nope").await,
            Err(ResultsStoreError::NotFound(_))
        ));
    }
}
