mod error;
mod fake;
mod postgres;
mod repository;

pub use error::{PersistenceError, Result};
pub use fake::FakeSubmissionRepository;
pub use postgres::PostgresSubmissionRepository;
pub use repository::{BoxFuture, SubmissionRepository};
