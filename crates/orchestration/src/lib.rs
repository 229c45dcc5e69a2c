mod orchestrator;
mod types;

pub use orchestrator::AnalysisOrchestrator;
pub use types::QuestionReadyPayload;
