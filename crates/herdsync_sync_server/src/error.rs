//! Error types for the sync server.

use herdsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed or inconsistent request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No handler for the requested path.
    #[error("unknown path: {0}")]
    UnknownPath(String),

    /// Protocol version mismatch.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch {
        /// Version the server speaks.
        expected: u16,
        /// Version the client sent.
        actual: u16,
    },

    /// Request body could not be decoded or response encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::UnknownPath(_)
                | ServerError::ProtocolMismatch { .. }
                | ServerError::Protocol(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Internal(_))
    }
}
