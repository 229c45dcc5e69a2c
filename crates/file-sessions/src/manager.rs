use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::error::{FileSessionError, Result};
use crate::types::{DEFAULT_CLEANUP_TIMEOUT_MINUTES, FileSessionInfo, SessionRecord};

/// Tracks every transcoded audio file between conversion and the moment
/// every dependent service has reported completion (spec §4.4). The index
/// is mutated only under its own lock; file deletions always happen after
/// the lock guarding the decision has been released (spec §5).
#[derive(Default)]
pub struct FileSessionManager {
    sessions: RwLock<HashMap<String, Mutex<SessionRecord>>>,
    session_counter: AtomicU64,
}

impl FileSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministically derived from the question key plus a
    /// monotonically increasing counter and the current timestamp, so
    /// retries of the same question produce different session ids
    /// (spec §3).
    pub fn generate_session_id(&self, submission_key: &str, question_number: u32) -> String {
        let counter = self.session_counter.fetch_add(1, Ordering::Relaxed);
        let timestamp = Utc::now().timestamp_millis();
        format!("{submission_key}:{question_number}:{counter}:{timestamp}")
    }

    /// Registers a new session. Fails with [`FileSessionError::FileNotFound`]
    /// if `file_path` does not exist, and with
    /// [`FileSessionError::AlreadyRegistered`] if `session_id` is already
    /// tracked — registration is monotonic (spec §4.4).
    pub async fn register(
        &self,
        session_id: impl Into<String>,
        file_path: impl Into<String>,
        dependencies: HashSet<String>,
        cleanup_timeout_minutes: Option<f64>,
    ) -> Result<()> {
        let session_id = session_id.into();
        let file_path = file_path.into();

        if tokio::fs::metadata(&file_path).await.is_err() {
            return Err(FileSessionError::FileNotFound(file_path));
        }

        let mut guard = self.sessions.write().await;
        if guard.contains_key(&session_id) {
            return Err(FileSessionError::AlreadyRegistered(session_id));
        }

        let minutes = cleanup_timeout_minutes.unwrap_or(DEFAULT_CLEANUP_TIMEOUT_MINUTES);
        let record = SessionRecord {
            file_path,
            created_at: Utc::now(),
            cleanup_timeout: Duration::from_secs_f64((minutes * 60.0).max(0.0)),
            dependencies,
            cleanup_completed: false,
        };

        guard.insert(session_id, Mutex::new(record));
        Ok(())
    }

    /// Removes `service_name` from the pending dependency set. When the
    /// set becomes empty the file is deleted and the session retired.
    /// Returns `false` for unknown sessions without raising — services
    /// that fail mid-analysis must still call this so the file is not
    /// stranded (spec §4.4).
    pub async fn mark_service_complete(&self, session_id: &str, service_name: &str) -> bool {
        self.claim_cleanup_if(session_id, |record| {
            record.dependencies.remove(service_name);
            record.dependencies.is_empty()
        })
        .await
    }

    /// Unconditional terminal cleanup, used by operators, the periodic
    /// sweep, and the Submission Aggregator as a safety net (spec §4.4).
    pub async fn force_cleanup(&self, session_id: &str) -> bool {
        self.claim_cleanup_if(session_id, |_| true).await
    }

    /// Runs `should_cleanup` under the per-session lock to decide whether
    /// this call is the one that gets to delete the file, then performs
    /// the deletion outside any lock. Returns `true` iff `session_id` was
    /// known (regardless of whether this call triggered cleanup).
    async fn claim_cleanup_if(
        &self,
        session_id: &str,
        should_cleanup: impl FnOnce(&mut SessionRecord) -> bool,
    ) -> bool {
        let claimed_path = {
            let guard = self.sessions.read().await;
            let Some(lock) = guard.get(session_id) else {
                tracing::debug!(session_id, "file_session_unknown");
                return false;
            };
            let mut record = lock.lock().await;
            if record.cleanup_completed {
                None
            } else if should_cleanup(&mut record) {
                record.cleanup_completed = true;
                Some(record.file_path.clone())
            } else {
                None
            }
        };

        if let Some(path) = claimed_path {
            self.finish_cleanup(session_id, &path).await;
        }
        true
    }

    async fn finish_cleanup(&self, session_id: &str, file_path: &str) {
        match tokio::fs::remove_file(file_path).await {
            Ok(()) => tracing::info!(session_id, file_path, "file_session_cleaned_up"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(session_id, file_path, "file_session_file_already_gone");
            }
            Err(e) => {
                tracing::warn!(session_id, file_path, error = %e, "file_session_delete_failed");
            }
        }
        self.sessions.write().await.remove(session_id);
    }

    /// Force-cleans any active session whose `created_at + cleanup_timeout`
    /// has elapsed. Intended to run on a coarse timer (spec §4.4).
    pub async fn periodic_cleanup(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = {
            let guard = self.sessions.read().await;
            let mut ids = Vec::new();
            for (session_id, lock) in guard.iter() {
                let record = lock.lock().await;
                if !record.cleanup_completed && record.is_expired(now) {
                    ids.push(session_id.clone());
                }
            }
            ids
        };

        for session_id in &expired {
            self.force_cleanup(session_id).await;
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "periodic_cleanup_reaped_sessions");
        }
        expired.len()
    }

    pub async fn get_session_info(&self, session_id: &str) -> Option<FileSessionInfo> {
        let guard = self.sessions.read().await;
        let lock = guard.get(session_id)?;
        let record = lock.lock().await;
        Some(FileSessionInfo {
            session_id: session_id.to_string(),
            file_path: record.file_path.clone(),
            created_at: record.created_at,
            cleanup_timeout_secs: record.cleanup_timeout.as_secs_f64(),
            dependencies: record.dependencies.iter().cloned().collect(),
            cleanup_completed: record.cleanup_completed,
        })
    }

    pub async fn get_active_sessions(&self) -> Vec<FileSessionInfo> {
        let guard = self.sessions.read().await;
        let mut out = Vec::with_capacity(guard.len());
        for (session_id, lock) in guard.iter() {
            let record = lock.lock().await;
            out.push(FileSessionInfo {
                session_id: session_id.clone(),
                file_path: record.file_path.clone(),
                created_at: record.created_at,
                cleanup_timeout_secs: record.cleanup_timeout.as_secs_f64(),
                dependencies: record.dependencies.iter().cloned().collect(),
                cleanup_completed: record.cleanup_completed,
            });
        }
        out
    }
}

/// Spawns the coarse periodic-cleanup timer described in spec §4.4,
/// mirroring the timer-driven background task style of
/// `crates/llm-cactus/src/manager.rs`'s inactivity watcher.
pub fn spawn_periodic_cleanup(
    manager: Arc<FileSessionManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            manager.periodic_cleanup().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    async fn temp_wav() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    fn deps(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn register_requires_existing_file() {
        let manager = FileSessionManager::new();
        let err = manager
            .register("s1", "/no/such/file", deps(&["pronunciation"]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FileSessionError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn double_registration_is_rejected() {
        let manager = FileSessionManager::new();
        let file = temp_wav().await;
        let path = file.path().to_str().unwrap().to_string();
        manager
            .register("s1", path.clone(), deps(&["pronunciation"]), None)
            .await
            .unwrap();
        let err = manager
            .register("s1", path, deps(&["pronunciation"]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FileSessionError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn last_dependency_triggers_cleanup() {
        let manager = FileSessionManager::new();
        let file = temp_wav().await;
        let path = file.path().to_str().unwrap().to_string();
        manager
            .register("s1", path.clone(), deps(&["pronunciation"]), None)
            .await
            .unwrap();

        assert!(manager.mark_service_complete("s1", "pronunciation").await);
        assert!(manager.get_session_info("s1").await.is_none());
        assert!(tokio::fs::metadata(&path).await.is_err());
    }

    #[tokio::test]
    async fn unknown_session_returns_benign_negative() {
        let manager = FileSessionManager::new();
        assert!(!manager.mark_service_complete("nope", "pronunciation").await);
        assert!(!manager.force_cleanup("nope").await);
    }

    #[tokio::test]
    async fn partial_dependency_completion_keeps_file() {
        let manager = FileSessionManager::new();
        let file = temp_wav().await;
        let path = file.path().to_str().unwrap().to_string();
        manager
            .register(
                "s1",
                path.clone(),
                deps(&["pronunciation", "fluency"]),
                None,
            )
            .await
            .unwrap();

        manager.mark_service_complete("s1", "pronunciation").await;
        assert!(manager.get_session_info("s1").await.is_some());
        assert!(tokio::fs::metadata(&path).await.is_ok());

        manager.mark_service_complete("s1", "fluency").await;
        assert!(manager.get_session_info("s1").await.is_none());
    }

    #[tokio::test]
    async fn periodic_cleanup_reaps_expired_sessions() {
        let manager = FileSessionManager::new();
        let file = temp_wav().await;
        let path = file.path().to_str().unwrap().to_string();
        manager
            .register("s1", path.clone(), deps(&["pronunciation"]), Some(0.0))
            .await
            .unwrap();

        let reaped = manager.periodic_cleanup().await;
        assert_eq!(reaped, 1);
        assert!(tokio::fs::metadata(&path).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_on_cleanup_is_swallowed() {
        let manager = FileSessionManager::new();
        let file = temp_wav().await;
        let path = file.path().to_str().unwrap().to_string();
        manager
            .register("s1", path.clone(), deps(&["pronunciation"]), None)
            .await
            .unwrap();

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(manager.force_cleanup("s1").await);
        assert!(manager.get_session_info("s1").await.is_none());
    }

    #[tokio::test]
    async fn generate_session_id_never_collides() {
        let manager = FileSessionManager::new();
        let a = manager.generate_session_id("s1", 1);
        let b = manager.generate_session_id("s1", 1);
        assert_ne!(a, b);
    }
}
