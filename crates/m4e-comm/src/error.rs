//! Connection error types.

use thiserror::Error;

/// Result type for connection operations.
pub type CommResult<T> = Result<T, CommError>;

/// Result type for raw transport writes.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by the connection layer.
#[derive(Debug, Error)]
pub enum CommError {
    /// Operation needs an open connection.
    #[error("not connected")]
    NotConnected,

    /// Packet encoded to empty text.
    #[error("refusing to send an empty message")]
    EmptyMessage,

    /// No session cookie from a prior sign-in.
    #[error("no session cookie available, sign in before connecting")]
    MissingSession,

    /// Server URL could not be turned into a WebSocket endpoint.
    #[error("invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Session cookie cannot be carried in a request header.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Transport write failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// WebSocket handshake or read failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The driver task is gone.
    #[error("connection driver has stopped")]
    DriverStopped,
}

impl CommError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a [`Transport`](crate::Transport) write.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The writing side has shut down.
    #[error("transport closed")]
    Closed,

    /// A write call accepted nothing.
    #[error("transport stalled after {sent} of {total} bytes")]
    Stalled { sent: usize, total: usize },

    /// A write call stopped inside a multi-byte character.
    #[error("partial write split a UTF-8 character at byte {0}")]
    SplitCharacter(usize),

    /// Any other failure reported by the transport.
    #[error("{0}")]
    Other(String),
}
