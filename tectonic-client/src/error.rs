//! Client error types.

use thiserror::Error;

/// Client errors.
///
/// A response whose success flag is false is not an error; it comes back as
/// an ordinary `Response` for the caller to branch on.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] tectonic_protocol::ProtocolError),

    #[error("request timeout")]
    Timeout,

    #[error("not connected")]
    NotConnected,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns whether the session that produced this error must be rebuilt.
    ///
    /// Transport failures, timeouts and short frames all leave the stream at
    /// an unknown position, so nothing further can be read from it.
    pub fn is_fatal(&self) -> bool {
        match self {
            ClientError::Connect { .. } => true,
            ClientError::Transport(_) => true,
            ClientError::Timeout => true,
            ClientError::NotConnected => true,
            ClientError::Protocol(e) => e.is_desync(),
            ClientError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tectonic_protocol::ProtocolError;

    #[test]
    fn test_fatal_classification() {
        assert!(ClientError::Timeout.is_fatal());
        assert!(ClientError::NotConnected.is_fatal());
        assert!(ClientError::Transport(std::io::ErrorKind::BrokenPipe.into()).is_fatal());
        assert!(ClientError::from(ProtocolError::ShortHeader { received: 3 }).is_fatal());

        assert!(!ClientError::from(ProtocolError::InvalidUtf8).is_fatal());
        let json_err = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        assert!(!ClientError::from(json_err).is_fatal());
    }

    #[test]
    fn test_connect_error_display() {
        let err = ClientError::Connect {
            addr: "localhost:9001".into(),
            source: std::io::ErrorKind::ConnectionRefused.into(),
        };
        assert!(err.to_string().contains("localhost:9001"));
    }
}
