//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur while framing or interpreting responses.
///
/// Short reads are never recoverable: the stream has no frame boundary marker
/// to resynchronize on, so the connection that produced one must be dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("short header: connection closed after {received} of 9 bytes")]
    ShortHeader { received: usize },

    #[error("short body: connection closed after {received} of {expected} bytes")]
    ShortBody { expected: u64, received: u64 },

    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: u64, max: u64 },

    #[error("invalid UTF-8 in body")]
    InvalidUtf8,

    #[error("invalid row: {0:?}")]
    InvalidRow(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Returns whether the error leaves the byte stream at an unknown offset.
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            ProtocolError::ShortHeader { .. }
                | ProtocolError::ShortBody { .. }
                | ProtocolError::BodyTooLarge { .. }
        )
    }
}
