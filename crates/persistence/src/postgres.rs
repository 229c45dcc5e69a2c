use results_store::QuestionResult;
use sqlx::PgPool;
use sqlx::Row;

use crate::error::{PersistenceError, Result};
use crate::repository::{BoxFuture, SubmissionRepository};

/// Production [`SubmissionRepository`] backed by Postgres. The schema
/// itself is out of scope (spec §1); this only assumes a
/// `submission_results` table keyed by submission, and the
/// `submissions -> assignments.questions[n-1].timeLimit` join described
/// in spec §6.
pub struct PostgresSubmissionRepository {
    pool: PgPool,
}

impl PostgresSubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SubmissionRepository for PostgresSubmissionRepository {
    fn save_submission_results<'a>(
        &'a self,
        submission_key: &'a str,
        total_questions: u32,
        results: &'a [QuestionResult],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let payload = serde_json::to_value(results)
                .map_err(|e| PersistenceError::Database(e.to_string()))?;

            sqlx::query(
                "insert into submission_results (submission_key, total_questions, results) \
                 values ($1, $2, $3) \
                 on conflict (submission_key) do update set results = excluded.results, \
                 total_questions = excluded.total_questions",
            )
            .bind(submission_key)
            .bind(total_questions as i32)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

            Ok(())
        })
    }

    fn question_time_limit<'a>(
        &'a self,
        submission_key: &'a str,
        question_number: u32,
    ) -> BoxFuture<'a, Result<Option<f64>>> {
        Box::pin(async move {
            let index = (question_number as i32) - 1;
            let row = sqlx::query(
                "select (a.questions -> $2 ->> 'timeLimit')::float8 as time_limit \
                 from submissions s \
                 join assignments a on a.id = s.assignment_id \
                 where s.submission_key = $1",
            )
            .bind(submission_key)
            .bind(index)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))?;

            Ok(row.and_then(|r| r.try_get::<Option<f64>, _>("time_limit").ok().flatten()))
        })
    }
}
