//! Client error types.

use std::fmt;

use m4e_comm::CommError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// Sign-in required before connecting.
    SessionRequired(String),
    /// Connection to the server failed or was lost.
    Connection(String),
    /// Malformed packet or payload.
    Protocol(String),
    /// Gave up waiting for the server.
    Timeout(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::SessionRequired(msg) => write!(f, "session required: {}", msg),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CommError> for ClientError {
    fn from(err: CommError) -> Self {
        match err {
            CommError::MissingSession => Self::SessionRequired(err.to_string()),
            CommError::InvalidUrl { .. } | CommError::InvalidHeader { .. } => {
                Self::Config(err.to_string())
            }
            other => Self::Connection(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_session_maps_to_session_required() {
        let err = ClientError::from(CommError::MissingSession);
        assert!(matches!(err, ClientError::SessionRequired(_)));
    }

    #[test]
    fn invalid_url_is_a_config_problem() {
        let err = ClientError::from(CommError::invalid_url("ftp://x", "unsupported scheme ftp"));
        assert!(matches!(err, ClientError::Config(_)));
        assert!(err.to_string().starts_with("configuration error"));
    }
}
