use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_CLEANUP_TIMEOUT_MINUTES: f64 = 30.0;

#[derive(Debug, Clone)]
pub(crate) struct SessionRecord {
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub cleanup_timeout: Duration,
    pub dependencies: HashSet<String>,
    pub cleanup_completed: bool,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.cleanup_timeout) {
            Ok(timeout) => now >= self.created_at + timeout,
            Err(_) => true,
        }
    }
}

/// Observability snapshot of a [`SessionRecord`], returned by
/// `get_session_info`/`get_active_sessions` (spec §4.4).
#[derive(Debug, Clone, Serialize)]
pub struct FileSessionInfo {
    pub session_id: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    pub cleanup_timeout_secs: f64,
    pub dependencies: Vec<String>,
    pub cleanup_completed: bool,
}
