use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
