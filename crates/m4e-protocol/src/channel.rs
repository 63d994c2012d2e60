//! Logical channels multiplexed over one connection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Channel tag of a packet.
///
/// Tags the client does not know are kept verbatim in [`Channel::Other`] so a
/// packet survives decode/encode unchanged and the router can report what it
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Channel {
    /// Connection status, keepalive and other server housekeeping.
    System,
    /// Chat messages between users or within an event.
    Chat,
    /// User notifications.
    Notify,
    /// Event updates (members, locations, votes).
    Event,
    /// Any other tag.
    Other(String),
}

impl Channel {
    /// Channels the router knows how to deliver.
    pub const KNOWN: [Channel; 4] = [
        Channel::System,
        Channel::Chat,
        Channel::Notify,
        Channel::Event,
    ];

    /// Returns the wire tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Chat => "chat",
            Self::Notify => "notify",
            Self::Event => "event",
            Self::Other(tag) => tag,
        }
    }

    /// Returns true for tags outside the known set.
    pub fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for Channel {
    fn from(tag: &str) -> Self {
        match tag {
            "system" => Self::System,
            "chat" => Self::Chat,
            "notify" => Self::Notify,
            "event" => Self::Event,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Channel {
    fn from(tag: String) -> Self {
        match Self::from(tag.as_str()) {
            Self::Other(_) => Self::Other(tag),
            known => known,
        }
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
