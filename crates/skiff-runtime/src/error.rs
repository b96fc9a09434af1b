//! Error types for the runtime layer.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors a runtime driver can surface to the core.
///
/// Control loops treat `Unavailable` as a whole-tick failure (log, retry
/// next tick) and `OpFailed` as a per-replica failure (clean up partial
/// state, move on). `UnknownDriver` can only occur at startup and is fatal.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    OpFailed(String),

    #[error("unknown runtime driver: {0:?}")]
    UnknownDriver(String),
}
