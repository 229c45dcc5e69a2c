mod error;
mod store;
mod types;

pub use error::{Result, ResultsStoreError};
pub use store::{BeginFinalize, ResultsStore, StoreOutcome};
pub use types::{
    DurationFeedback, QuestionKey, QuestionNumber, QuestionResult, SubResult, SubmissionAggregate,
    SubmissionKey,
};
