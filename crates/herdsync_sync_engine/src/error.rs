//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Backend rejections and conflicts are outcomes, not errors; they are
/// reported through the drain report and the conflict set.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local data layer error.
    #[error("local store error: {0}")]
    Core(#[from] herdsync_core::CoreError),

    /// A transmission exceeded the per-operation timeout.
    #[error("operation timed out")]
    Timeout,

    /// Another drain is in progress.
    #[error("a sync is already running")]
    AlreadyRunning,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }
}

impl From<herdsync_protocol::ProtocolError> for SyncError {
    fn from(err: herdsync_protocol::ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}
