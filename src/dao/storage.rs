use std::error::Error;
use thiserror::Error;

/// Result alias for coordination store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by coordination store backends regardless of the underlying engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Short description of the failure.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Backend did not answer within the command deadline.
    #[error("storage operation `{operation}` timed out")]
    Timeout {
        /// Command that timed out.
        operation: &'static str,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
