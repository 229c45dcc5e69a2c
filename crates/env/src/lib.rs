use std::path::Path;
use std::sync::OnceLock;

use serde::Deserialize;

fn default_port() -> u16 {
    8080
}

fn default_session_cleanup_timeout_minutes() -> f64 {
    30.0
}

fn default_session_cleanup_sweep_minutes() -> f64 {
    5.0
}

fn default_coordination_sweep_max_age_minutes() -> f64 {
    60.0
}

/// Process-wide configuration, loaded once via `envy` the same way
/// `apps/api/src/env.rs` does it: an optional `.env` file first, then
/// the real environment, deserialized straight into typed fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Env {
    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    /// Base URL the event bus client posts to; per-topic paths are
    /// appended by the caller (the broker binding is configurable per
    /// spec §4.2).
    pub event_bus_base_url: String,

    pub audio_transcoder_base_url: String,
    pub speech_to_text_base_url: String,
    pub pronunciation_base_url: String,
    pub text_analysis_base_url: String,
    pub fluency_base_url: String,

    #[serde(default = "default_session_cleanup_timeout_minutes")]
    pub session_cleanup_timeout_minutes: f64,
    #[serde(default = "default_session_cleanup_sweep_minutes")]
    pub session_cleanup_sweep_minutes: f64,
    #[serde(default = "default_coordination_sweep_max_age_minutes")]
    pub coordination_sweep_max_age_minutes: f64,
}

static ENV: OnceLock<Env> = OnceLock::new();

/// Loads configuration exactly once, memoizing it in a process-wide
/// `OnceLock`. No handler path performs lazy init (spec §9's "Global
/// registries" design note applies equally to config, not just the
/// vocabulary service).
pub fn env() -> &'static Env {
    ENV.get_or_init(|| {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let repo_root = manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(manifest_dir);

        let _ = dotenvy::from_path(repo_root.join(".env"));
        envy::from_env().expect("failed to load environment")
    })
}
