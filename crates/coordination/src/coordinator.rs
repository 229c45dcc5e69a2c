use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eventbus::{EventPublisher, Topic};
use results_store::QuestionKey;
use tokio::sync::{Mutex, RwLock};

use crate::types::{AudioReadyPayload, CoordinationState, TranscriptReadyPayload};

/// Per-question fan-in of (audio-ready, transcript-ready); emits
/// `QUESTION_ANALYSIS_READY` once both arrive (spec §4.5).
pub struct AnalysisCoordinator {
    states: RwLock<HashMap<QuestionKey, Arc<Mutex<CoordinationState>>>>,
    publisher: Arc<dyn EventPublisher>,
}

impl AnalysisCoordinator {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            publisher,
        }
    }

    async fn cell_for(&self, key: &QuestionKey, total_questions: u32) -> Arc<Mutex<CoordinationState>> {
        if let Some(cell) = self.states.read().await.get(key) {
            return cell.clone();
        }
        let mut guard = self.states.write().await;
        guard
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(CoordinationState::new(total_questions))))
            .clone()
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn on_audio_ready(
        &self,
        submission_key: &str,
        question_number: u32,
        total_questions: u32,
        session_id: String,
        wav_path: String,
        audio_duration: f64,
        error: Option<String>,
    ) {
        let key = QuestionKey::new(submission_key, question_number);
        let cell = self.cell_for(&key, total_questions).await;

        let emit_payload = {
            let mut state = cell.lock().await;
            if state.audio.is_none() {
                state.audio = Some(AudioReadyPayload {
                    session_id,
                    wav_path,
                    audio_duration,
                    error,
                });
            }
            self.maybe_claim_emit(&key, &mut state)
        };

        if let Some(payload) = emit_payload {
            self.publisher
                .publish(Topic::QuestionAnalysisReady, &payload)
                .await;
        }
    }

    pub async fn on_transcript_ready(
        &self,
        submission_key: &str,
        question_number: u32,
        total_questions: u32,
        transcript_text: String,
        word_details: serde_json::Value,
        error: Option<String>,
    ) {
        let key = QuestionKey::new(submission_key, question_number);
        let cell = self.cell_for(&key, total_questions).await;

        let emit_payload = {
            let mut state = cell.lock().await;
            if state.transcript.is_none() {
                state.transcript = Some(TranscriptReadyPayload {
                    transcript_text,
                    word_details,
                    error,
                });
            }
            self.maybe_claim_emit(&key, &mut state)
        };

        if let Some(payload) = emit_payload {
            self.publisher
                .publish(Topic::QuestionAnalysisReady, &payload)
                .await;
        }
    }

    /// Under the caller's lock on `state`: if both sides are present and
    /// this coordination hasn't emitted yet, claim the single-shot emit
    /// and build the outbound payload. Returns `None` otherwise. The
    /// actual publish happens after the lock is released.
    fn maybe_claim_emit(
        &self,
        key: &QuestionKey,
        state: &mut CoordinationState,
    ) -> Option<serde_json::Value> {
        if !state.ready_to_emit() {
            return None;
        }
        state.emitted = true;

        let audio = state.audio.as_ref().expect("audio present");
        let transcript = state.transcript.as_ref().expect("transcript present");

        let error = match (&audio.error, &transcript.error) {
            (Some(a), Some(t)) => Some(format!("{a}; {t}")),
            (Some(a), None) => Some(a.clone()),
            (None, Some(t)) => Some(t.clone()),
            (None, None) => None,
        };

        let mut payload = serde_json::json!({
            "submission_url": key.submission_key,
            "question_number": key.question_number,
            "session_id": audio.session_id,
            "wav_path": audio.wav_path,
            "audio_duration": audio.audio_duration,
            "transcript": transcript.transcript_text,
            "word_details": transcript.word_details,
            "total_questions": state.total_questions,
        });
        if let Some(error) = error {
            payload["error"] = serde_json::Value::String(error);
        }
        Some(payload)
    }

    /// Purges CoordinationStates older than `max_age`. A later arrival for
    /// a purged key is treated as new and will re-emit if both sides show
    /// up again; downstream idempotence (Analysis Orchestrator's
    /// `emitted_complete`) is what makes that safe (spec §4.5).
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return 0;
        };

        let expired: Vec<QuestionKey> = {
            let guard = self.states.read().await;
            let mut keys = Vec::new();
            for (key, cell) in guard.iter() {
                let state = cell.lock().await;
                if now - state.created_at > max_age {
                    keys.push(key.clone());
                }
            }
            keys
        };

        let mut removed = 0;
        if !expired.is_empty() {
            let mut guard = self.states.write().await;
            for key in &expired {
                if guard.remove(key).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }
}

/// Spawns the coarse sweep timer that purges stale half-complete
/// coordination state (spec §4.5), mirroring
/// `crates/file-sessions/src/manager.rs`'s periodic-cleanup task.
pub fn spawn_periodic_sweep(
    coordinator: Arc<AnalysisCoordinator>,
    interval: Duration,
    max_age: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = coordinator.sweep_expired(max_age).await;
            if removed > 0 {
                tracing::info!(removed, "coordination_sweep_purged_stale_states");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventbus::RecordingEventBus;

    fn coordinator() -> (AnalysisCoordinator, Arc<RecordingEventBus>) {
        let bus = Arc::new(RecordingEventBus::new());
        (AnalysisCoordinator::new(bus.clone()), bus)
    }

    #[tokio::test]
    async fn emits_once_both_sides_arrive_audio_first() {
        let (coordinator, bus) = coordinator();
        coordinator
            .on_audio_ready("s1", 1, 1, "sess".into(), "/tmp/a.wav".into(), 30.0, None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 0);

        coordinator
            .on_transcript_ready("s1", 1, 1, "hello".into(), serde_json::json!([]), None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 1);
    }

    #[tokio::test]
    async fn emits_once_both_sides_arrive_transcript_first() {
        let (coordinator, bus) = coordinator();
        coordinator
            .on_transcript_ready("s1", 1, 1, "hello".into(), serde_json::json!([]), None)
            .await;
        coordinator
            .on_audio_ready("s1", 1, 1, "sess".into(), "/tmp/a.wav".into(), 30.0, None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 1);
    }

    #[tokio::test]
    async fn duplicate_audio_ready_does_not_double_emit() {
        let (coordinator, bus) = coordinator();
        coordinator
            .on_audio_ready("s1", 1, 1, "sess".into(), "/tmp/a.wav".into(), 30.0, None)
            .await;
        coordinator
            .on_transcript_ready("s1", 1, 1, "hello".into(), serde_json::json!([]), None)
            .await;
        coordinator
            .on_audio_ready("s1", 1, 1, "sess2".into(), "/tmp/b.wav".into(), 31.0, None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 1);
    }

    #[tokio::test]
    async fn error_on_one_side_still_emits_with_error_coalesced() {
        let (coordinator, bus) = coordinator();
        coordinator
            .on_audio_ready(
                "s1",
                1,
                1,
                "sess".into(),
                "/tmp/a.wav".into(),
                0.0,
                Some("conversion_failed".into()),
            )
            .await;
        coordinator
            .on_transcript_ready("s1", 1, 1, "".into(), serde_json::json!([]), None)
            .await;

        let events = bus.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].payload["error"].as_str(),
            Some("conversion_failed")
        );
    }

    #[tokio::test]
    async fn independent_keys_do_not_interfere() {
        let (coordinator, bus) = coordinator();
        coordinator
            .on_audio_ready("s1", 1, 2, "sess".into(), "/tmp/a.wav".into(), 30.0, None)
            .await;
        coordinator
            .on_audio_ready("s1", 2, 2, "sess".into(), "/tmp/b.wav".into(), 30.0, None)
            .await;
        coordinator
            .on_transcript_ready("s1", 1, 2, "hello".into(), serde_json::json!([]), None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 1);

        coordinator
            .on_transcript_ready("s1", 2, 2, "world".into(), serde_json::json!([]), None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 2);
    }

    #[tokio::test]
    async fn sweep_expired_allows_re_emission_for_purged_key() {
        let (coordinator, bus) = coordinator();
        coordinator
            .on_audio_ready("s1", 1, 1, "sess".into(), "/tmp/a.wav".into(), 30.0, None)
            .await;
        coordinator
            .on_transcript_ready("s1", 1, 1, "hello".into(), serde_json::json!([]), None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 1);

        let removed = coordinator.sweep_expired(Duration::from_secs(0)).await;
        assert_eq!(removed, 1);

        coordinator
            .on_audio_ready("s1", 1, 1, "sess2".into(), "/tmp/c.wav".into(), 30.0, None)
            .await;
        coordinator
            .on_transcript_ready("s1", 1, 1, "hi".into(), serde_json::json!([]), None)
            .await;
        assert_eq!(bus.count(Topic::QuestionAnalysisReady), 2);
    }
}
