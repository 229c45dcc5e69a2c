use thiserror::Error;

pub type Result<T> = std::result::Result<T, FileSessionError>;

#[derive(Debug, Error)]
pub enum FileSessionError {
    #[error("file does not exist: {0}")]
    FileNotFound(String),

    #[error("session already registered: {0}")]
    AlreadyRegistered(String),
}
