mod coordinator;
mod types;

pub use coordinator::{AnalysisCoordinator, spawn_periodic_sweep};
pub use types::{AudioReadyPayload, TranscriptReadyPayload};
