use thiserror::Error;

/// Unified error type for command handlers and the delivery layer.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Transport or I/O failure.
    #[error("io error: {0}")]
    Io(String),
    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CoreError {
    fn from(error: std::io::Error) -> Self {
        CoreError::Io(error.to_string())
    }
}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;
