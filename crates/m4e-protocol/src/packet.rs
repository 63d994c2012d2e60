//! The packet exchanged over the real-time connection.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::Channel;
use crate::error::{ProtocolError, ProtocolResult};

/// One message on the connection.
///
/// Decoding is permissive: fields missing from the wire text fall back to
/// empty values instead of failing, since server payloads vary between
/// versions. Only text that is not a JSON object is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Packet {
    channel: Channel,
    source_id: String,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient_id: Option<String>,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    time: Option<DateTime<Utc>>,
    data: Value,
}

impl Packet {
    /// Creates a packet without a timestamp.
    ///
    /// The connection stamps it when it is sent.
    pub fn new(channel: Channel, source_id: impl Into<String>, data: Value) -> Self {
        Self {
            channel,
            source_id: source_id.into(),
            data,
            ..Default::default()
        }
    }

    /// Builder: set the human-readable source name.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Builder: address the packet to a user or event.
    pub fn with_recipient(mut self, recipient_id: impl Into<String>) -> Self {
        self.recipient_id = Some(recipient_id.into());
        self
    }

    /// Builder: set the timestamp.
    ///
    /// The wire carries milliseconds, so finer precision is dropped here to
    /// keep encode/decode lossless.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time.trunc_subsecs(3));
        self
    }

    /// Stamps the packet with `now` unless it already has a timestamp.
    ///
    /// Returns true if the timestamp was filled in.
    pub fn ensure_time(&mut self, now: DateTime<Utc>) -> bool {
        if self.time.is_some() {
            return false;
        }
        self.time = Some(now.trunc_subsecs(3));
        true
    }

    /// Returns the channel tag.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the sender identity (user id or system).
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Returns the sender's display name.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the recipient, if the packet is addressed.
    pub fn recipient_id(&self) -> Option<&str> {
        self.recipient_id.as_deref()
    }

    /// Returns the creation or receive time.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Returns the channel-specific payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the packet, returning its payload.
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Encodes the packet as wire text.
    ///
    /// Does not touch the timestamp; an unset time is simply omitted.
    pub fn to_json(&self) -> String {
        // String keys and JSON values only, so this cannot fail in practice.
        // An empty string is refused by the connection's send path.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decodes wire text.
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        if text.trim().is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn full_packet_roundtrip() {
        let packet = Packet::new(Channel::Chat, "17", json!({"text": "lunch?", "n": [1, 2]}))
            .with_source("alice")
            .with_recipient("42")
            .with_time(fixed_time());

        let decoded = Packet::from_json(&packet.to_json()).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.recipient_id(), Some("42"));
        assert_eq!(decoded.time(), Some(fixed_time()));
    }

    #[test]
    fn serialize_does_not_stamp_time() {
        let packet = Packet::new(Channel::Notify, "system", Value::Null);
        let text = packet.to_json();
        assert!(!text.contains("\"time\""));

        let decoded = Packet::from_json(&text).unwrap();
        assert_eq!(decoded.time(), None);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn ensure_time_only_fills_unset() {
        let mut packet = Packet::new(Channel::Chat, "1", Value::Null);
        assert!(packet.ensure_time(fixed_time()));
        assert_eq!(packet.time(), Some(fixed_time()));

        let later = fixed_time() + chrono::Duration::seconds(5);
        assert!(!packet.ensure_time(later));
        assert_eq!(packet.time(), Some(fixed_time()));
    }

    #[test]
    fn stamped_time_survives_roundtrip() {
        let mut packet = Packet::new(Channel::Event, "3", json!({}));
        packet.ensure_time(Utc::now());

        let decoded = Packet::from_json(&packet.to_json()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn missing_fields_default() {
        let packet = Packet::from_json(r#"{"channel":"chat"}"#).unwrap();
        assert_eq!(packet.channel(), &Channel::Chat);
        assert_eq!(packet.source_id(), "");
        assert_eq!(packet.source(), "");
        assert_eq!(packet.recipient_id(), None);
        assert_eq!(packet.time(), None);
        assert_eq!(packet.data(), &Value::Null);
    }

    #[test]
    fn empty_object_decodes() {
        let packet = Packet::from_json("{}").unwrap();
        assert_eq!(packet, Packet::default());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let packet = Packet::from_json(r#"{"channel":"system","extra":true}"#).unwrap();
        assert_eq!(packet.channel(), &Channel::System);
    }

    #[test]
    fn unknown_channel_roundtrips() {
        let packet = Packet::from_json(r#"{"channel":"mail","sourceId":"9"}"#).unwrap();
        assert_eq!(packet.channel(), &Channel::Other("mail".into()));

        let again = Packet::from_json(&packet.to_json()).unwrap();
        assert_eq!(again, packet);
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert!(matches!(
            Packet::from_json("{not json"),
            Err(ProtocolError::Parse(_))
        ));
        assert!(matches!(
            Packet::from_json("[1, 2]"),
            Err(ProtocolError::Parse(_))
        ));
        assert!(matches!(
            Packet::from_json("   "),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn wire_shape() {
        let packet = Packet::new(Channel::Chat, "17", json!({"text": "hi"}))
            .with_source("alice")
            .with_time(fixed_time());

        insta::assert_json_snapshot!(packet, @r#"
        {
          "channel": "chat",
          "sourceId": "17",
          "source": "alice",
          "time": 1700000000123,
          "data": {
            "text": "hi"
          }
        }
        "#);
    }
}
