//! Connection status sent by the server right after the socket opens.

use serde::Deserialize;
use serde_json::Value;

use crate::PROTOCOL_VERSION;
use crate::error::{ProtocolError, ProtocolResult};

/// Version recorded when the server did not announce one.
pub const UNKNOWN_PROTOCOL_VERSION: &str = "???";

/// Handshake information carried by the first message of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Server protocol version.
    pub protocol_version: String,
    /// Server verdict on the connection ("ok" when accepted).
    pub status: String,
    /// Human-readable description.
    pub description: String,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            protocol_version: UNKNOWN_PROTOCOL_VERSION.to_string(),
            status: String::new(),
            description: String::new(),
        }
    }
}

impl ConnectionStatus {
    /// Decodes the handshake message.
    ///
    /// The status may arrive bare (`{"protocolVersion":"1.2"}`) or wrapped
    /// in a system packet's `data`. Fails only if the text is not a JSON
    /// object.
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        if text.trim().is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        let value: Value = serde_json::from_str(text)?;
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(ProtocolError::Parse(serde::de::Error::custom(format!(
                    "expected a JSON object, got {other}"
                ))));
            }
        };

        let body = if object.contains_key("protocolVersion") {
            Value::Object(object)
        } else {
            match object.get("data") {
                Some(data @ Value::Object(_)) => data.clone(),
                _ => Value::Object(object),
            }
        };

        Ok(serde_json::from_value(body).unwrap_or_default())
    }

    /// Returns true when the server accepted the connection.
    pub fn is_ok(&self) -> bool {
        self.status.is_empty() || self.status == "ok"
    }

    /// Returns true when the server speaks [`PROTOCOL_VERSION`].
    pub fn is_supported(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_status() {
        let status = ConnectionStatus::from_json(r#"{"protocolVersion":"1.2"}"#).unwrap();
        assert_eq!(status.protocol_version, "1.2");
        assert!(status.is_ok());
    }

    #[test]
    fn status_wrapped_in_system_packet() {
        let text = r#"{"channel":"system","sourceId":"","time":1,
            "data":{"protocolVersion":"1.0.0","status":"ok","description":"User bob established a connection"}}"#;
        let status = ConnectionStatus::from_json(text).unwrap();
        assert_eq!(status.protocol_version, "1.0.0");
        assert_eq!(status.status, "ok");
        assert!(status.description.contains("bob"));
    }

    #[test]
    fn missing_version_is_unknown() {
        let status = ConnectionStatus::from_json(r#"{"channel":"system","data":{}}"#).unwrap();
        assert_eq!(status.protocol_version, UNKNOWN_PROTOCOL_VERSION);
    }

    #[test]
    fn wrongly_typed_version_is_unknown() {
        let status = ConnectionStatus::from_json(r#"{"protocolVersion":12}"#).unwrap();
        assert_eq!(status.protocol_version, UNKNOWN_PROTOCOL_VERSION);
    }

    #[test]
    fn rejected_status() {
        let status = ConnectionStatus::from_json(r#"{"protocolVersion":"1.0.0","status":"nok"}"#)
            .unwrap();
        assert!(!status.is_ok());
    }

    #[test]
    fn version_support() {
        let current = ConnectionStatus::from_json(r#"{"protocolVersion":"1.0.0"}"#).unwrap();
        assert!(current.is_supported());

        let newer = ConnectionStatus::from_json(r#"{"protocolVersion":"2.0.0"}"#).unwrap();
        assert!(!newer.is_supported());
        assert!(!ConnectionStatus::default().is_supported());
    }

    #[test]
    fn non_object_is_an_error() {
        assert!(ConnectionStatus::from_json("\"1.2\"").is_err());
        assert!(ConnectionStatus::from_json("{oops").is_err());
        assert!(ConnectionStatus::from_json("").is_err());
    }
}
