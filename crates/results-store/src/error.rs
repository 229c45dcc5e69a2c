use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResultsStoreError>;

#[derive(Debug, Error)]
pub enum ResultsStoreError {
    #[error("no submission found for key {0}")]
    NotFound(String),
}
