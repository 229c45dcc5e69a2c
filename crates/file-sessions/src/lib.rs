mod error;
mod manager;
mod types;

pub use error::{FileSessionError, Result};
pub use manager::{FileSessionManager, spawn_periodic_cleanup};
pub use types::{DEFAULT_CLEANUP_TIMEOUT_MINUTES, FileSessionInfo};
