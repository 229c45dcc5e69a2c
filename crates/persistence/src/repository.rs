use std::pin::Pin;

use results_store::QuestionResult;

use crate::error::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// External collaborator abstraction for the relational database (spec
/// §6, explicitly out of scope as a concrete schema): persists the final
/// per-submission results and answers the per-question time-limit lookup
/// the Submission Aggregator needs for duration feedback.
pub trait SubmissionRepository: Send + Sync {
    fn save_submission_results<'a>(
        &'a self,
        submission_key: &'a str,
        total_questions: u32,
        results: &'a [QuestionResult],
    ) -> BoxFuture<'a, Result<()>>;

    /// `time_limit` in minutes, from
    /// `submissions -> assignments.questions[question_number-1].timeLimit`
    /// (spec §6). `None` if absent or the join comes up empty.
    fn question_time_limit<'a>(
        &'a self,
        submission_key: &'a str,
        question_number: u32,
    ) -> BoxFuture<'a, Result<Option<f64>>>;
}
