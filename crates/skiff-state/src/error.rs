//! Error types for the state store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can abort the process. Runtime persistence failures are
/// deliberately absent: the store logs them and carries on, because the
/// in-memory state is canonical once the process is up.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to create data directory {path}: {source}")]
    Init {
        path: PathBuf,
        source: std::io::Error,
    },
}
