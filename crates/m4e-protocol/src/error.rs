//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding wire text.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Text is not well-formed JSON, or not shaped like a packet.
    #[error("malformed packet: {0}")]
    Parse(#[from] serde_json::Error),

    /// Empty text received.
    #[error("empty message")]
    EmptyMessage,
}
