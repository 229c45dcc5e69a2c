use std::future::Future;
use std::time::Duration;

use results_store::SubResult;

/// Recommended per-call ceiling for any analysis/transcoder endpoint (spec §5).
pub const ANALYSIS_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Wraps an analysis call, normalizing an elapsed deadline into the same
/// `SubResult::Error` shape a client would otherwise produce for an
/// upstream failure, so callers don't need a separate timeout branch.
pub async fn with_timeout<F>(fut: F) -> SubResult
where
    F: Future<Output = SubResult>,
{
    match tokio::time::timeout(ANALYSIS_CALL_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => SubResult::Error {
            error: "timeout".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_fast_result() {
        let result = with_timeout(async { SubResult::success(90.0, vec![], Default::default()) }).await;
        assert!(matches!(result, SubResult::Success { grade, .. } if grade == 90.0));
    }

    #[tokio::test]
    async fn maps_elapsed_deadline_to_timeout_error() {
        let result = with_timeout(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            SubResult::success(1.0, vec![], Default::default())
        });
        tokio::time::pause();
        let handle = tokio::spawn(result);
        tokio::time::advance(ANALYSIS_CALL_TIMEOUT + Duration::from_secs(1)).await;
        let result = handle.await.unwrap();
        assert!(matches!(result, SubResult::Error { error } if error == "timeout"));
    }
}
